#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the emulator integration tests.
//!
//! Provides an emulator factory on a virtual clock, a thread-safe
//! [`Recorder`] for callback deliveries, and canned table fixtures.

use std::sync::{Arc, Mutex, Once};

use data_client_emulator::{ClientEmulator, EmulatorConfig, ManualScheduler, Row};
use serde_json::{json, Value};

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh emulator on a virtual clock.
pub fn emulator() -> (ClientEmulator, ManualScheduler) {
    init_tracing();
    ClientEmulator::manual(EmulatorConfig::new())
}

/// The two-row table used by the single-read and bulk-update scenarios.
pub fn two_rows() -> Value {
    json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}])
}

/// A richer table for filter tests.
pub fn people() -> Value {
    json!([
        {"id": 1, "name": "Ada",   "age": 36, "team": "core", "tags": ["math", "poetry"]},
        {"id": 2, "name": "Brook", "age": 17, "team": "web",  "tags": ["chess"]},
        {"id": 3, "name": "Cyd",   "age": 52, "team": "core", "tags": ["math"]},
        {"id": 4, "name": "dana",  "age": 29, "team": null,   "tags": []},
        {"id": 5, "name": "Eli",   "age": 41, "team": "web",  "tags": ["go", "math"]},
    ])
}

/// Convert an object literal into a [`Row`].
pub fn row(value: Value) -> Row {
    value.as_object().cloned().expect("row literal must be an object")
}

/// Ids of `rows`, in order.
pub fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r["id"].as_i64().expect("numeric id")).collect()
}

/// Records values delivered to callbacks, in delivery order.
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.seen.lock().unwrap().push(value);
    }

    pub fn seen(&self) -> Vec<T> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}
