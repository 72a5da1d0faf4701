//! Cancellable delayed callbacks.
//!
//! A [`Deferred`] owns a spawned task that sleeps for a fixed delay and then runs
//! a future. The entity that armed it (a customer, a pending expectation) keeps
//! the handle and cancels it, either explicitly or by dropping it.
//!
//! # Cancellation contract
//!
//! Cancellation is only observed at `.await` points. Callbacks therefore follow
//! one rule: acquire the shared state lock, re-check that the thing they were
//! armed for still exists, and mutate **without awaiting again**. Cancellers hold
//! the same lock while cancelling. Together this gives:
//!
//! - cancelled while sleeping or while waiting for the lock: the callback never
//!   touches state
//! - already holding the lock: the canceller waits, and the callback runs to
//!   completion first
//!
//! There is no partial execution. A callback that loses a race finds its entry
//! gone and returns without doing anything.
//!
//! # Example
//!
//! ```
//! use concourse_runtime::Deferred;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! let timer = Deferred::spawn(Duration::from_millis(5), async move {
//!     flag.store(true, Ordering::SeqCst);
//! });
//! timer.cancel();
//! tokio::time::sleep(Duration::from_millis(20)).await;
//! assert!(!fired.load(Ordering::SeqCst));
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a callback scheduled after a delay.
///
/// Dropping the handle cancels the callback.
#[derive(Debug)]
pub struct Deferred {
    handle: JoinHandle<()>,
}

impl Deferred {
    /// Schedule `task` to run once `delay` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "dropping a Deferred cancels it"]
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Cancel the callback if it has not started mutating state yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the callback has run to completion or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Deferred {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
