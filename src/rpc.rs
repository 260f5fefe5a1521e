//! Canned responses for remote procedure calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::error::EmulatorError;
use crate::response::Response;
use crate::sync::lock;

#[derive(Debug, Clone)]
struct RpcEntry {
    response: Value,
    error: Option<EmulatorError>,
}

/// Name-keyed registry of RPC results.
///
/// Call parameters are never inspected: a registered name always resolves to
/// the same `{ response, error }` pair.
#[derive(Debug, Clone, Default)]
pub struct RpcRegistry {
    inner: Arc<Mutex<HashMap<String, RpcEntry>>>,
}

impl RpcRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the result for `name`. When `error` is set the
    /// call fails with it and `response` is not returned.
    pub fn register(&self, name: &str, response: Value, error: Option<EmulatorError>) {
        lock(&self.inner).insert(name.to_owned(), RpcEntry { response, error });
    }

    /// Returns `true` if `name` has a registered result.
    pub fn is_registered(&self, name: &str) -> bool {
        lock(&self.inner).contains_key(name)
    }

    /// Resolve a call to `name`. Unregistered names fail with
    /// [`EmulatorError::RpcNotMocked`].
    pub fn call(&self, name: &str) -> Response<Value> {
        let entry = lock(&self.inner).get(name).cloned();
        debug!(name, registered = entry.is_some(), "rpc call");
        match entry {
            Some(RpcEntry {
                error: Some(error), ..
            }) => Response::err(error),
            Some(RpcEntry { response, .. }) => Response::ok(response),
            None => Response::from(Err(EmulatorError::RpcNotMocked {
                name: name.to_owned(),
            })),
        }
    }
}
