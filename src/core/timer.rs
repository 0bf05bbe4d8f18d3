//! Idle auto-leave timer.
//!
//! Each arming creates a new instance tagged with a monotonically increasing
//! [`Generation`]. Only the live generation may act when its delay elapses: the
//! spawned task checks before invoking its callback, and the callback is expected
//! to check again (via [`DisconnectTimer::complete`]) under the owning session's lock,
//! so an instance that was defused or replaced while waiting never acts.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::trace;

/// Tag distinguishing one armed timer instance from the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

/// No instance is live.
const SPENT: u64 = 0;

/// A cancellable, re-armable delayed action.
#[derive(Debug)]
pub struct DisconnectTimer {
    last_generation: u64,
    live: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl Default for DisconnectTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisconnectTimer {
    /// Creates a timer with nothing armed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_generation: SPENT,
            live: Arc::new(AtomicU64::new(SPENT)),
            task: None,
        }
    }

    /// Arms the timer unless an instance is already live.
    ///
    /// Returns the new instance's generation, or `None` when the call was a no-op
    /// because a live instance keeps its original deadline.
    pub fn arm<F, Fut>(&mut self, after: Duration, on_expire: F) -> Option<Generation>
    where
        F: FnOnce(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_armed() {
            trace!("disconnect timer already live, keeping its deadline");
            return None;
        }

        self.last_generation += 1;
        let generation = Generation(self.last_generation);
        self.live.store(generation.0, Ordering::SeqCst);

        let live = Arc::clone(&self.live);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if live.load(Ordering::SeqCst) == generation.0 {
                on_expire(generation).await;
            }
        }));

        trace!(generation = generation.0, ?after, "disconnect timer armed");
        Some(generation)
    }

    /// Cancels the live instance. Returns whether anything was armed.
    pub fn defuse(&mut self) -> bool {
        let previous = self.live.swap(SPENT, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if previous != SPENT {
            trace!(generation = previous, "disconnect timer defused");
        }
        previous != SPENT
    }

    /// Marks `generation` spent if it is still the live instance.
    ///
    /// Called from the expiry callback; returns `false` for a stale instance, in
    /// which case the callback must do nothing.
    pub fn complete(&mut self, generation: Generation) -> bool {
        if self
            .live
            .compare_exchange(generation.0, SPENT, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        // The task is the caller; detach rather than abort it.
        self.task = None;
        true
    }

    /// Whether an instance is live.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.live.load(Ordering::SeqCst) != SPENT
    }

    /// Whether `generation` is the live instance.
    #[must_use]
    pub fn is_live(&self, generation: Generation) -> bool {
        generation.0 != SPENT && self.live.load(Ordering::SeqCst) == generation.0
    }
}

impl Drop for DisconnectTimer {
    fn drop(&mut self) {
        self.defuse();
    }
}
