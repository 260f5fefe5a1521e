//! Timer abstraction for the emulator's deferred deliveries.
//!
//! Only two things in the emulator are ever deferred: replay of scripted auth
//! events to a new subscriber, and delivery of scripted realtime events to a
//! channel's listeners. Both go through the [`Scheduler`] trait so tests can
//! swap wall-clock timers for a virtual clock and advance it deterministically.
//!
//! # Ordering
//!
//! Implementations **MUST** run tasks in order of their due time, and tasks
//! with equal due times in the order they were scheduled.
//!
//! # Cancellation
//!
//! There is none. A scheduled task always runs once its due time passes,
//! regardless of what happened to the subscriber or channel that scheduled it.
//!
//! # Implementing a Custom Scheduler
//!
//! ```rust
//! use std::time::Duration;
//! use data_client_emulator::scheduler::{Scheduler, Task};
//!
//! /// Runs every task immediately, ignoring the delay.
//! struct Immediate;
//!
//! impl Scheduler for Immediate {
//!     fn schedule(&self, _delay: Duration, task: Task) {
//!         task();
//!     }
//! }
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs [`Task`]s after a delay.
///
/// This trait is object-safe; the emulator stores its scheduler as
/// `Arc<dyn Scheduler>`.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` once `delay` has elapsed.
    ///
    /// Must not run `task` synchronously inside this call unless the
    /// implementation is documented to do so; callers may hold no locks but
    /// expect the current call stack to finish first.
    fn schedule(&self, delay: Duration, task: Task);
}

// ── Timer queue ─────────────────────────────────────────────────────

/// One pending task keyed on `(due, seq)`.
struct Timer<D> {
    due: D,
    seq: u64,
    task: Task,
}

impl<D: Ord> PartialEq for Timer<D> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<D: Ord> Eq for Timer<D> {}

impl<D: Ord> PartialOrd for Timer<D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<D: Ord> Ord for Timer<D> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of tasks ordered by due time, then by insertion order.
///
/// Shared by the virtual-time and the tokio-backed schedulers so both give
/// the same ordering guarantee.
pub(crate) struct TimerQueue<D> {
    heap: BinaryHeap<Reverse<Timer<D>>>,
    next_seq: u64,
}

impl<D: Ord + Copy> TimerQueue<D> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn push(&mut self, due: D, task: Task) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Reverse(Timer { due, seq, task }));
    }

    /// Due time of the earliest pending task.
    pub(crate) fn peek_due(&self) -> Option<D> {
        self.heap.peek().map(|Reverse(timer)| timer.due)
    }

    /// Pop the earliest task if it is due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: D) -> Option<(D, Task)> {
        if self.peek_due()? > now {
            return None;
        }
        self.heap
            .pop()
            .map(|Reverse(timer)| (timer.due, timer.task))
    }

    /// Pop the earliest task regardless of its due time.
    pub(crate) fn pop_next(&mut self) -> Option<(D, Task)> {
        self.heap
            .pop()
            .map(|Reverse(timer)| (timer.due, timer.task))
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_task = Arc::clone(&log);
        let make = move |n: u32| -> Task {
            let log = Arc::clone(&log_for_task);
            Box::new(move || log.lock().unwrap().push(n))
        };
        (log, make)
    }

    #[test]
    fn pops_by_due_then_insertion_order() {
        let (log, task) = recorder();
        let mut queue = TimerQueue::new();
        queue.push(5u64, task(1));
        queue.push(1u64, task(2));
        queue.push(5u64, task(3));
        queue.push(1u64, task(4));

        while let Some((_, t)) = queue.pop_next() {
            t();
        }
        assert_eq!(*log.lock().unwrap(), vec![2, 4, 1, 3]);
    }

    #[test]
    fn pop_due_respects_now() {
        let (_log, task) = recorder();
        let mut queue = TimerQueue::new();
        queue.push(10u64, task(1));
        assert!(queue.pop_due(9).is_none());
        assert_eq!(queue.len(), 1);
        let (due, _) = queue.pop_due(10).expect("due at 10");
        assert_eq!(due, 10);
        assert_eq!(queue.len(), 0);
        assert!(queue.peek_due().is_none());
    }
}
