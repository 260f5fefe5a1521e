//! The emulated client facade.
//!
//! [`ClientEmulator`] owns one instance of every registry (tables, RPCs,
//! auth, realtime) plus the [`Scheduler`] that drives deferred deliveries.
//! It exposes two surfaces:
//!
//! - the **consumer** surface application code calls exactly as it would
//!   call the real client: [`from`](ClientEmulator::from),
//!   [`rpc`](ClientEmulator::rpc), [`channel`](ClientEmulator::channel),
//!   [`auth`](ClientEmulator::auth);
//! - the **configuration** surface test setup uses to script the backend:
//!   `set_table_data`, `set_table_error`, `register_rpc`,
//!   `set_auth_principal`, `set_auth_error`, `script_auth_event`,
//!   `schedule_realtime_event`.
//!
//! Configuration may happen at any time, including after the emulator was
//! handed to code under test; it takes effect on the next read of the
//! affected registry.
//!
//! # Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! use data_client_emulator::{ClientEmulator, EmulatorConfig};
//! use serde_json::json;
//!
//! let (client, scheduler) = ClientEmulator::manual(EmulatorConfig::new());
//! client.register_rpc("get_count", json!(42), None);
//! client.schedule_realtime_event("room", "INSERT", json!({"id": 1}), Duration::from_millis(100));
//!
//! assert_eq!(client.rpc("get_count", json!({})).await.data, Some(json!(42)));
//!
//! let _channel = client
//!     .channel("room")
//!     .on("INSERT", &json!({"table": "messages"}), |payload| println!("{payload}"))
//!     .subscribe();
//! scheduler.advance(Duration::from_millis(100));
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::auth::{AuthChangeEvent, AuthClient, Session, User};
use crate::error::EmulatorError;
use crate::query::QueryBuilder;
use crate::realtime::{RealtimeChannel, RealtimeRegistry};
use crate::response::Response;
use crate::rpc::RpcRegistry;
use crate::scheduler::Scheduler;
use crate::schedulers::ManualScheduler;
use crate::store::{rows_from_value, Operation, Row, RowStore};

/// Default delay before scripted auth events reach a new subscriber.
const DEFAULT_REPLAY_DELAY: Duration = Duration::ZERO;

/// Default delay for realtime events scheduled without an explicit delay.
const DEFAULT_EVENT_DELAY: Duration = Duration::from_millis(100);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ClientEmulator`].
///
/// # Example
///
/// ```
/// use data_client_emulator::EmulatorConfig;
/// use std::time::Duration;
///
/// let config = EmulatorConfig::new()
///     .with_replay_delay(Duration::from_millis(5))
///     .with_default_event_delay(Duration::from_millis(50));
/// assert_eq!(config.replay_delay, Duration::from_millis(5));
/// ```
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Delay before each scripted auth event is replayed to a new subscriber.
    ///
    /// Defaults to **zero**: the replay runs on the next scheduler tick, never
    /// inside the subscribe call.
    pub replay_delay: Duration,
    /// Delay used by [`ClientEmulator::schedule_realtime_event`] when the
    /// caller passes `None`.
    ///
    /// Defaults to **100 ms**.
    pub default_event_delay: Duration,
}

impl EmulatorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            replay_delay: DEFAULT_REPLAY_DELAY,
            default_event_delay: DEFAULT_EVENT_DELAY,
        }
    }

    /// Set the auth replay delay.
    #[must_use]
    pub fn with_replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// Set the default realtime event delay.
    #[must_use]
    pub fn with_default_event_delay(mut self, delay: Duration) -> Self {
        self.default_event_delay = delay;
        self
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Facade ──────────────────────────────────────────────────────────

/// In-memory emulator of the remote-data client.
///
/// Every registry belongs to this instance alone; construct a fresh emulator
/// per test.
pub struct ClientEmulator {
    config: EmulatorConfig,
    scheduler: Arc<dyn Scheduler>,
    store: RowStore,
    rpc: RpcRegistry,
    auth: AuthClient,
    realtime: RealtimeRegistry,
}

impl ClientEmulator {
    /// Create an emulator whose deferred deliveries run on `scheduler`.
    pub fn new(config: EmulatorConfig, scheduler: impl Scheduler) -> Self {
        Self::with_scheduler(config, Arc::new(scheduler))
    }

    /// Create an emulator sharing an already type-erased scheduler.
    pub fn with_scheduler(config: EmulatorConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        debug!(?config, "client emulator created");
        Self {
            auth: AuthClient::new(Arc::clone(&scheduler), config.replay_delay),
            config,
            scheduler,
            store: RowStore::new(),
            rpc: RpcRegistry::new(),
            realtime: RealtimeRegistry::new(),
        }
    }

    /// Create an emulator on a virtual clock, returning the clock handle
    /// tests use to advance time.
    pub fn manual(config: EmulatorConfig) -> (Self, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        (Self::new(config, scheduler.clone()), scheduler)
    }

    /// Create an emulator whose deferred deliveries run on tokio timers.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "tokio-runtime")]
    pub fn start(config: EmulatorConfig) -> Self {
        Self::new(config, crate::schedulers::TokioScheduler::start())
    }

    /// The configuration this emulator was built with.
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    // ── Consumer surface ────────────────────────────────────────────

    /// Start a query against `table`. The builder works on a copy of the
    /// table's rows taken now.
    pub fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(self.store.clone(), table)
    }

    /// Alias of [`from`](Self::from).
    pub fn table(&self, table: &str) -> QueryBuilder {
        self.from(table)
    }

    /// Call a remote procedure. `params` are accepted and ignored.
    pub async fn rpc(&self, name: &str, _params: Value) -> Response<Value> {
        self.rpc.call(name)
    }

    /// Obtain a fresh handle to channel `name`, with no listeners.
    pub fn channel(&self, name: &str) -> RealtimeChannel {
        RealtimeChannel::new(name, self.realtime.clone(), Arc::clone(&self.scheduler))
    }

    /// Unsubscribe `channel`. Scheduled broadcasts are not cancelled.
    pub fn remove_channel(&self, channel: &mut RealtimeChannel) {
        channel.unsubscribe();
    }

    /// The auth namespace.
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    // ── Configuration surface ───────────────────────────────────────

    /// Replace the rows of `table` with `rows` (an array of objects, or a
    /// single object).
    pub fn set_table_data(&self, table: &str, rows: Value) {
        self.store.set_rows(table, rows_from_value(rows));
    }

    /// Install (`Some`) or clear (`None`) a standing error for `table` and
    /// `operation`.
    pub fn set_table_error(&self, table: &str, operation: Operation, error: Option<EmulatorError>) {
        self.store.set_error(table, operation, error);
    }

    /// Current rows of `table`, for assertions.
    pub fn table_rows(&self, table: &str) -> Vec<Row> {
        self.store.rows(table)
    }

    /// Drop every table and standing table error.
    pub fn clear_tables(&self) {
        self.store.clear();
    }

    /// Register the result of RPC `name`.
    pub fn register_rpc(&self, name: &str, response: Value, error: Option<EmulatorError>) {
        self.rpc.register(name, response, error);
    }

    /// Set the principal and session silently.
    pub fn set_auth_principal(&self, user: Option<User>, session: Option<Session>) {
        self.auth.set_principal(user, session);
    }

    /// Install (`Some`) or clear (`None`) the standing auth error.
    pub fn set_auth_error(&self, error: Option<EmulatorError>) {
        self.auth.set_error(error);
    }

    /// Append an event to the auth script replayed to new subscribers.
    pub fn script_auth_event(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.auth.script_event(event, session);
    }

    /// Script a realtime event on `channel`. A `None` delay uses
    /// [`EmulatorConfig::default_event_delay`].
    pub fn schedule_realtime_event(
        &self,
        channel: &str,
        kind: &str,
        payload: Value,
        delay: impl Into<Option<Duration>>,
    ) {
        let delay = delay.into().unwrap_or(self.config.default_event_delay);
        self.realtime.schedule_event(channel, kind, payload, delay);
    }
}

impl std::fmt::Debug for ClientEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEmulator")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("auth", &self.auth)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn config_defaults() {
        let config = EmulatorConfig::default();
        assert_eq!(config.replay_delay, Duration::ZERO);
        assert_eq!(config.default_event_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn configuration_after_handoff_takes_effect_on_next_read() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        let builder = client.from("t");
        client.set_table_data("t", json!([{"id": 1}]));

        // Already-open builder keeps its (empty) snapshot.
        assert_eq!(builder.await.data, Some(vec![]));
        assert_eq!(client.from("t").await.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn table_alias_matches_from() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        client.set_table_data("t", json!({"id": 1}));
        assert_eq!(client.table("t").await, client.from("t").await);
    }

    #[tokio::test]
    async fn rpc_ignores_params() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        client.register_rpc("f", json!("ok"), None);
        assert_eq!(client.rpc("f", json!({"a": 1})).await.data, Some(json!("ok")));
        assert_eq!(client.rpc("f", Value::Null).await.data, Some(json!("ok")));
    }

    #[test]
    fn default_event_delay_applies_when_none() {
        let config = EmulatorConfig::new().with_default_event_delay(Duration::from_millis(7));
        let (client, scheduler) = ClientEmulator::manual(config);
        client.schedule_realtime_event("c", "INSERT", json!(1), None);

        let hits = Arc::new(Mutex::new(0));
        let hits_cb = Arc::clone(&hits);
        let _ch = client
            .channel("c")
            .on("INSERT", &json!({}), move |_| *hits_cb.lock().unwrap() += 1)
            .subscribe();

        scheduler.advance(Duration::from_millis(6));
        assert_eq!(*hits.lock().unwrap(), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn remove_channel_unsubscribes_handle() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        let mut ch = client.channel("c").on("INSERT", &json!({}), |_| {});
        client.remove_channel(&mut ch);
        assert_eq!(ch.listener_count(), 0);
    }

    #[test]
    fn clear_tables_drops_rows_and_errors() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        client.set_table_data("t", json!([{"id": 1}]));
        client.set_table_error("t", Operation::Select, Some(EmulatorError::injected("x")));
        client.clear_tables();
        assert!(client.table_rows("t").is_empty());
        let res = tokio_test::block_on(client.from("t").execute());
        assert!(res.error.is_none());
    }

    #[test]
    fn debug_impl_for_emulator() {
        let (client, _) = ClientEmulator::manual(EmulatorConfig::new());
        client.set_table_data("people", json!([{"id": 1}]));
        let debug = format!("{client:?}");
        assert!(debug.contains("ClientEmulator"));
        assert!(debug.contains("people"));
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test(start_paused = true)]
    async fn start_uses_tokio_timers() {
        let client = ClientEmulator::start(EmulatorConfig::new());
        client.script_auth_event(AuthChangeEvent::SignedIn, None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let _sub = client
            .auth()
            .on_auth_state_change(move |event, _| seen_cb.lock().unwrap().push(event));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*seen.lock().unwrap(), vec![AuthChangeEvent::SignedIn]);
    }
}
