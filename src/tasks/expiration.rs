//! Expiration Timer
//!
//! Single-shot, cancellable timer that hands an expiration sweep to the
//! blocking pool when it fires.

use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// The one outstanding sweep of a table.
///
/// Arming always replaces the previous timer, so at most one sweep is ever
/// pending. An interval of `Duration::ZERO` means nothing is scheduled.
#[derive(Debug)]
pub(crate) struct ExpirationTimer {
    runtime: Option<Handle>,
    pending: Option<JoinHandle<()>>,
    interval: Duration,
    deadline: Option<Instant>,
}

impl ExpirationTimer {
    /// Creates an idle timer that spawns on `runtime` once armed.
    pub(crate) fn new(runtime: Option<Handle>) -> Self {
        Self {
            runtime,
            pending: None,
            interval: Duration::ZERO,
            deadline: None,
        }
    }

    /// Returns the duration the pending sweep was scheduled for.
    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the time left until the pending sweep fires.
    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    // == Cancel ==
    /// Aborts the pending sweep, if any, and clears the schedule.
    pub(crate) fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.interval = Duration::ZERO;
        self.deadline = None;
    }

    // == Arm ==
    /// Schedules `sweep` to run once `delay` has elapsed.
    ///
    /// Any pending sweep is cancelled first. When the timer fires, `sweep` is
    /// moved onto the blocking pool rather than run on the timer task, since
    /// it takes table locks and runs user callbacks.
    ///
    /// # Returns
    /// `false` if no runtime is available to drive the timer.
    pub(crate) fn arm<F>(&mut self, delay: Duration, sweep: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let Some(runtime) = self.runtime.as_ref() else {
            return false;
        };

        self.interval = delay;
        self.deadline = Some(Instant::now() + delay);
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?delay, "Expiration timer fired");
            drop(tokio::task::spawn_blocking(sweep));
        }));
        true
    }
}

impl Drop for ExpirationTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
