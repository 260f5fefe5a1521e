//! Emulated realtime channels.
//!
//! Test setup registers scripted events per channel name through
//! [`RealtimeRegistry::schedule_event`]. Consumer code obtains a
//! [`RealtimeChannel`] handle, registers listeners with
//! [`on`](RealtimeChannel::on) and calls
//! [`subscribe`](RealtimeChannel::subscribe); each scripted event is then
//! broadcast after its delay to the listeners the handle had **at subscribe
//! time**.
//!
//! # Dispatch rule
//!
//! A listener is keyed by its event kind followed by its serialized filter
//! descriptor. A scripted event of kind `k` reaches a listener when the
//! listener key starts with `k`, or when `k` starts with the listener's event
//! kind (so an `"INSERT"` listener also hears `"INSERT:extra"`). The filter
//! descriptor itself is never evaluated.
//!
//! # Lifetime
//!
//! Listeners are local to a handle: a second `channel(name)` call starts with
//! none. [`unsubscribe`](RealtimeChannel::unsubscribe) forgets the handle's
//! listeners but does not cancel broadcasts already scheduled.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::scheduler::Scheduler;
use crate::sync::lock;

/// Callback receiving a broadcast payload.
pub type RealtimeCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Status reported to the callback passed to
/// [`subscribe_with_status`](RealtimeChannel::subscribe_with_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ChannelStatus {
    Subscribed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribed => f.write_str("SUBSCRIBED"),
        }
    }
}

/// An event scripted for delivery on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedEvent {
    /// Event kind matched against listener keys.
    pub kind: String,
    /// Value handed to each matching listener.
    pub payload: Value,
    /// Time between subscribe and broadcast.
    pub delay: Duration,
}

// ── Registry ────────────────────────────────────────────────────────

/// Per-channel scripted events.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct RealtimeRegistry {
    inner: Arc<Mutex<HashMap<String, Vec<ScriptedEvent>>>>,
}

impl RealtimeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `payload` to be broadcast as `kind` on `channel`, `delay` after
    /// each subscribe.
    pub fn schedule_event(&self, channel: &str, kind: &str, payload: Value, delay: Duration) {
        lock(&self.inner)
            .entry(channel.to_owned())
            .or_default()
            .push(ScriptedEvent {
                kind: kind.to_owned(),
                payload,
                delay,
            });
    }

    /// Events scripted for `channel`, in registration order.
    pub fn events(&self, channel: &str) -> Vec<ScriptedEvent> {
        lock(&self.inner).get(channel).cloned().unwrap_or_default()
    }
}

// ── Channel handle ──────────────────────────────────────────────────

#[derive(Clone)]
struct Listener {
    kind: String,
    key: String,
    callback: RealtimeCallback,
}

impl Listener {
    fn hears(&self, event_kind: &str) -> bool {
        self.key.starts_with(event_kind) || event_kind.starts_with(self.kind.as_str())
    }
}

/// A handle to one emulated channel.
///
/// Created by [`ClientEmulator::channel`](crate::ClientEmulator::channel).
pub struct RealtimeChannel {
    id: Uuid,
    topic: String,
    listeners: Vec<Listener>,
    registry: RealtimeRegistry,
    scheduler: Arc<dyn Scheduler>,
}

impl RealtimeChannel {
    pub(crate) fn new(
        topic: &str,
        registry: RealtimeRegistry,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_owned(),
            listeners: Vec::new(),
            registry,
            scheduler,
        }
    }

    /// Unique id of this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Channel name this handle was obtained for.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of listeners currently registered on this handle.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Register `callback` for events of `kind`. `filter` only contributes
    /// to the listener key; it does not restrict delivery.
    #[must_use]
    pub fn on<F>(mut self, kind: &str, filter: &Value, callback: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let key = format!("{kind}{}", serde_json::to_string(filter).unwrap_or_default());
        self.listeners.push(Listener {
            kind: kind.to_owned(),
            key,
            callback: Arc::new(callback),
        });
        self
    }

    /// Start delivery of the channel's scripted events.
    #[must_use]
    pub fn subscribe(self) -> Self {
        self.schedule_broadcasts();
        self
    }

    /// Like [`subscribe`](Self::subscribe), but first reports
    /// [`ChannelStatus::Subscribed`] to `status` synchronously.
    #[must_use]
    pub fn subscribe_with_status<F>(self, status: F) -> Self
    where
        F: FnOnce(ChannelStatus),
    {
        status(ChannelStatus::Subscribed);
        self.schedule_broadcasts();
        self
    }

    /// Forget this handle's listeners. Broadcasts already scheduled still
    /// reach the listeners they captured.
    pub fn unsubscribe(&mut self) {
        debug!(topic = %self.topic, listeners = self.listeners.len(), "channel unsubscribed");
        self.listeners.clear();
    }

    fn schedule_broadcasts(&self) {
        let events = self.registry.events(&self.topic);
        debug!(
            topic = %self.topic,
            events = events.len(),
            listeners = self.listeners.len(),
            "channel subscribed"
        );
        for ScriptedEvent {
            kind,
            payload,
            delay,
        } in events
        {
            let listeners = self.listeners.clone();
            let topic = self.topic.clone();
            self.scheduler.schedule(
                delay,
                Box::new(move || {
                    let mut delivered = 0usize;
                    for listener in listeners.iter().filter(|l| l.hears(&kind)) {
                        (listener.callback)(payload.clone());
                        delivered += 1;
                    }
                    debug!(%topic, %kind, delivered, "realtime event broadcast");
                }),
            );
        }
    }
}

impl fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.listeners.iter().map(|l| l.key.as_str()).collect();
        f.debug_struct("RealtimeChannel")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("listeners", &keys)
            .finish()
    }
}
