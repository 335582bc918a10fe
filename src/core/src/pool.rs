//! Bounded worker pool.
//!
//! Runs submitted tasks with a fixed concurrency cap. `submit` blocks once the
//! cap is reached; `wait` joins every task and reports the first error seen.
//! Tasks that were already running when an error occurs are still driven to
//! completion, no cancellation happens.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{BomError, Result};

/// Bounded pool of concurrent tasks.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<()>>,
}

impl WorkerPool {
    /// Create a pool that runs at most `cap` tasks at a time.
    pub fn new(cap: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(cap)),
            tasks: JoinSet::new(),
        }
    }

    /// Submit a task, waiting until a slot is free.
    pub async fn submit<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BomError::Pool("pool semaphore closed".to_string()))?;

        self.tasks.spawn(async move {
            let result = task.await;
            drop(permit);
            result
        });

        Ok(())
    }

    /// Wait for every submitted task and return the first error recorded.
    pub async fn wait(mut self) -> Result<()> {
        let mut first_err: Option<BomError> = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(BomError::Pool(format!("worker task failed: {}", e)));
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
