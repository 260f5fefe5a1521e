//! Wall-clock scheduler backed by a tokio timer loop.
//!
//! [`TokioScheduler`] is a thin handle that hands tasks to a background timer
//! loop over an unbounded MPSC channel. The loop keeps pending tasks in a
//! `(deadline, seq)` ordered queue and sleeps until the earliest deadline, so
//! tasks sharing a deadline run in the order they were scheduled.
//!
//! # Feature gate
//!
//! Only available with the `tokio-runtime` feature (enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() {
//! use std::time::Duration;
//! use data_client_emulator::{Scheduler, TokioScheduler};
//!
//! let scheduler = TokioScheduler::start();
//! scheduler.schedule(Duration::from_millis(10), Box::new(|| println!("tick")));
//! tokio::time::sleep(Duration::from_millis(20)).await;
//! # }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::scheduler::{Scheduler, Task, TimerQueue};

/// Deadline used when `now + delay` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A task together with the instant it falls due.
struct TimerCommand {
    deadline: Instant,
    task: Task,
}

/// A [`Scheduler`] running tasks on tokio timers.
///
/// Must be started from within a tokio runtime. Dropping the handle aborts
/// the timer loop; tasks still pending at that point never run.
pub struct TokioScheduler {
    /// Sender half of the command channel to the timer loop.
    cmd_tx: mpsc::UnboundedSender<TimerCommand>,
    /// Handle to the background timer loop task.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TokioScheduler {
    /// Spawn the timer loop on the current runtime and return its handle.
    #[must_use = "dropping the scheduler stops its timer loop"]
    pub fn start() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<TimerCommand>();
        let task = tokio::spawn(timer_loop(cmd_rx));
        Self {
            cmd_tx,
            task: Some(task),
        }
    }

    /// Returns `true` while the background timer loop is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE);
        if self.cmd_tx.send(TimerCommand { deadline, task }).is_err() {
            warn!("timer loop is gone; dropping scheduled task");
        }
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Timer loop ──────────────────────────────────────────────────────

/// Background loop multiplexing new commands and the earliest deadline via
/// `tokio::select!`.
///
/// Exits when the command channel closes.
async fn timer_loop(mut cmd_rx: mpsc::UnboundedReceiver<TimerCommand>) {
    debug!("timer loop started");
    let mut queue: TimerQueue<Instant> = TimerQueue::new();

    loop {
        let next_deadline = queue.peek_due();
        tokio::select! {
            biased;

            // Branch 1: a newly scheduled task
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TimerCommand { deadline, task }) => queue.push(deadline, task),
                    None => {
                        debug!(pending = queue.len(), "command channel closed, timer loop exiting");
                        break;
                    }
                }
            }

            // Branch 2: the earliest deadline elapsed
            () = sleep_until(next_deadline) => {
                let now = Instant::now();
                while let Some((_, task)) = queue.pop_due(now) {
                    task();
                }
            }
        }
    }

    debug!("timer loop exited");
}

/// Sleep until `deadline`, or forever when there is nothing to wait for.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn push(log: &Arc<Mutex<Vec<u32>>>, n: u32) -> Task {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(n))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_tasks_in_deadline_order() {
        let scheduler = TokioScheduler::start();
        let log = Arc::new(Mutex::new(Vec::new()));

        scheduler.schedule(Duration::from_millis(30), push(&log, 3));
        scheduler.schedule(Duration::from_millis(10), push(&log, 1));
        scheduler.schedule(Duration::from_millis(20), push(&log, 2));

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(*log.lock().unwrap(), vec![1]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_deadlines_keep_scheduling_order() {
        let scheduler = TokioScheduler::start();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            scheduler.schedule(Duration::from_millis(5), push(&log, n));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_delays_are_clamped_not_fatal() {
        let scheduler = TokioScheduler::start();
        let log = Arc::new(Mutex::new(Vec::new()));

        scheduler.schedule(Duration::MAX, push(&log, 0));
        scheduler.schedule(Duration::from_millis(10), push(&log, 1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert!(scheduler.is_running());
    }

    #[tokio::test]
    async fn drop_aborts_timer_loop() {
        let scheduler = TokioScheduler::start();
        assert!(scheduler.is_running());
        let debug = format!("{scheduler:?}");
        assert!(debug.contains("running: true"));
        drop(scheduler);
    }
}
