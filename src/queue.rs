//! Bounded-concurrency request scheduling.
//!
//! One queue per fetch category (catalog vs. pricing) so a slow category
//! cannot starve another.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// FIFO job scheduler with a fixed concurrency limit.
///
/// Jobs submitted while all slots are busy wait in submission order; a
/// failing job settles only its own output and does not block siblings.
/// The queue imposes no timeout or cancellation: call-level timeouts
/// belong to the job's own fetch logic.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    limit: usize,
}

impl RequestQueue {
    /// The concurrency limit is fixed at construction.
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            active: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Run the job once a slot frees, bounding concurrent executions.
    /// Waiting submissions are granted slots in FIFO order.
    pub async fn submit<F>(&self, job: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("request queue semaphore closed");
        self.active.fetch_add(1, Ordering::SeqCst);
        let output = job.await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        output
    }

    /// Jobs currently executing.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
