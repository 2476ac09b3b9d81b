//! Bounded task executor
//!
//! One executor instance is shared across the whole serving side: every
//! inbound request handler runs through it, so total in-flight work is
//! capped by the pool capacity instead of growing with the connection count.
//! The permit is held for the task's lifetime and released when it
//! completes.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Executor error types
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// All permits are in use and the caller asked not to wait
    #[error("executor saturated: {0} tasks in flight")]
    Saturated(usize),

    /// The executor was shut down
    #[error("executor closed")]
    Closed,
}

/// Capacity-bounded task submission over a shared semaphore
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl BoundedExecutor {
    /// Create an executor with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Total pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Submit a task, waiting for a permit if the pool is full
    pub async fn submit<F>(&self, task: F) -> Result<JoinHandle<F::Output>, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        Ok(tokio::spawn(async move {
            let _permit = permit;
            task.await
        }))
    }

    /// Submit a task without waiting; fails when the pool is saturated
    pub fn try_submit<F>(&self, task: F) -> Result<JoinHandle<F::Output>, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| ExecutorError::Saturated(self.capacity))?;

        Ok(tokio::spawn(async move {
            let _permit = permit;
            task.await
        }))
    }
}
