//! # Data Client Emulator
//!
//! In-memory emulator of a chainable, promise-based remote-data client, for
//! testing code that talks to a hosted backend without the backend.
//!
//! ## Features
//!
//! - **Fluent queries**: filter, order and limit a table snapshot, then
//!   resolve a deferred select/insert/update/delete with
//!   [`single`](QueryBuilder::single) or by awaiting the builder
//! - **Error injection**: standing errors per table and operation, per RPC,
//!   and for auth
//! - **RPC mocking**: canned results keyed by function name
//! - **Auth state**: principal/session, synchronous sign-out fan-out, and
//!   scripted events replayed to every new subscriber
//! - **Realtime channels**: scripted events broadcast after a delay to
//!   prefix-matched listeners
//! - **Deterministic time**: deferred deliveries go through a [`Scheduler`];
//!   [`ManualScheduler`] gives tests a virtual clock
//!
//! ## Quick Start
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use data_client_emulator::{ClientEmulator, EmulatorConfig};
//! use serde_json::json;
//!
//! let (client, _scheduler) = ClientEmulator::manual(EmulatorConfig::new());
//! client.set_table_data("t", json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]));
//!
//! let res = client.from("t").update(json!({"name": "X"})).greater_than("id", 0).await;
//! assert!(res.error.is_none());
//! assert!(client.table_rows("t").iter().all(|row| row["name"] == "X"));
//! # });
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod error_codes;
pub mod filter;
pub mod query;
pub mod realtime;
pub mod response;
pub mod rpc;
pub mod scheduler;
pub mod schedulers;
pub mod store;

mod sync;

// Re-export primary types for ergonomic imports.
pub use auth::{AuthChangeEvent, AuthClient, AuthSubscription, Session, User};
pub use client::{ClientEmulator, EmulatorConfig};
pub use error::EmulatorError;
pub use error_codes::ErrorCode;
pub use query::QueryBuilder;
pub use realtime::{ChannelStatus, RealtimeChannel};
pub use response::Response;
pub use scheduler::Scheduler;
pub use schedulers::ManualScheduler;
pub use store::{Operation, Row};

#[cfg(feature = "tokio-runtime")]
pub use schedulers::TokioScheduler;
