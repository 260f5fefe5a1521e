//! Scheduler implementations.
//!
//! | Scheduler           | Clock              | Feature         |
//! |---------------------|--------------------|-----------------|
//! | [`ManualScheduler`] | virtual, advanced by hand | always   |
//! | [`TokioScheduler`]  | tokio timers       | `tokio-runtime` |
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use data_client_emulator::{ManualScheduler, Scheduler};
//!
//! let scheduler = ManualScheduler::new();
//! scheduler.schedule(Duration::from_millis(50), Box::new(|| println!("fired")));
//! assert_eq!(scheduler.pending(), 1);
//!
//! scheduler.advance(Duration::from_millis(50));
//! assert_eq!(scheduler.pending(), 0);
//! ```

pub mod manual;

#[cfg(feature = "tokio-runtime")]
pub mod tokio_timer;

pub use manual::ManualScheduler;

#[cfg(feature = "tokio-runtime")]
pub use tokio_timer::TokioScheduler;
