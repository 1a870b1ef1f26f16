//! Unit of work executed by the worker.

use crate::constants::defaults;
use crate::error::Result;
use crate::models::Task;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Result of executing a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOutput {
    pub summary: String,
}

/// Executes a delegated task.
///
/// Implementations may run more than once for the same task: redelivery
/// after a failure re-executes from scratch.
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<WorkOutput>;
}

/// Stand-in work: waits for a fixed duration and always succeeds
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self::new(Duration::from_millis(defaults::SIMULATED_WORK_MS))
    }
}

#[async_trait]
impl WorkExecutor for SimulatedWork {
    async fn execute(&self, task: &Task) -> Result<WorkOutput> {
        debug!(task_id = %task.task_id, duration_ms = self.duration.as_millis() as u64, "Simulating work");
        tokio::time::sleep(self.duration).await;
        Ok(WorkOutput {
            summary: defaults::SIMULATED_WORK_SUMMARY.to_string(),
        })
    }
}
