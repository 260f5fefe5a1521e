//! Virtual-time scheduler for deterministic tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::scheduler::{Scheduler, Task, TimerQueue};
use crate::sync::lock;

struct ManualState {
    now: Duration,
    queue: TimerQueue<Duration>,
}

/// A [`Scheduler`] driven by an explicit virtual clock.
///
/// Time starts at zero and only moves when [`advance`](Self::advance),
/// [`tick`](Self::tick) or [`run_until_idle`](Self::run_until_idle) is called.
/// Tasks run on the caller's thread, with no internal lock held, so a task
/// may schedule further tasks; those are timed relative to the running
/// task's due time and run within the same `advance` call if they fall due.
///
/// Cloning yields another handle to the same clock.
#[derive(Clone)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Create a scheduler with its clock at zero and no pending tasks.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now: Duration::ZERO,
                queue: TimerQueue::new(),
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    /// Number of tasks not yet run.
    pub fn pending(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let mut fired = 0;
        loop {
            let task = {
                let mut state = lock(&self.inner);
                match state.queue.pop_due(target) {
                    Some((due, task)) => {
                        state.now = state.now.max(due);
                        task
                    }
                    None => {
                        state.now = target;
                        break;
                    }
                }
            };
            task();
            fired += 1;
        }
        debug!(fired, now_ms = target.as_millis() as u64, "manual scheduler advanced");
        fired
    }

    /// Run the tasks due now (zero-delay tasks) without moving the clock.
    pub fn tick(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Keep advancing until no task is pending, however far that moves the
    /// clock.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let task = {
                let mut state = lock(&self.inner);
                match state.queue.pop_next() {
                    Some((due, task)) => {
                        state.now = state.now.max(due);
                        task
                    }
                    None => break,
                }
            };
            task();
            fired += 1;
        }
        fired
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = lock(&self.inner);
        let due = state.now.saturating_add(delay);
        state.queue.push(due, task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner);
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}
