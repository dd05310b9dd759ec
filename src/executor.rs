use crate::projection::engine::{ProjectionPlan, UnitProjection};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Semaphore error: {0}")]
    Semaphore(String),
    #[error("Unit task failed: {0}")]
    Join(String),
}

/// Runs per-unit timeline jobs on the blocking pool, a bounded number at a time.
pub struct UnitExecutor {
    semaphore: Arc<Semaphore>,
}

impl UnitExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Projects every unit of `plan`. Results come back in unit order.
    #[instrument(skip(self, plan), fields(units = plan.units().len()))]
    pub async fn execute(
        &self,
        plan: Arc<ProjectionPlan>,
    ) -> Result<Vec<UnitProjection>, ExecutorError> {
        let count = plan.units().len();
        let mut handles = Vec::with_capacity(count);

        for index in 0..count {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ExecutorError::Semaphore(e.to_string()))?;
            let plan = Arc::clone(&plan);

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                plan.project_index(index)
            }));
        }

        let mut results = Vec::with_capacity(count);
        for handle in handles {
            let projected = handle
                .await
                .map_err(|e| ExecutorError::Join(e.to_string()))?;
            results.push(projected);
        }

        debug!(units = count, "Unit timelines finished");
        Ok(results)
    }
}
