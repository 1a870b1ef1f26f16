//! # Task Worker (SDA-BE)
//!
//! Executes delegated tasks and reports completion. Per delivery the handler
//! walks `RECEIVED → CHECKED → IN_PROGRESS → REPORTED → TERMINAL`.
//!
//! A final report for the task is the idempotency witness. The report is
//! persisted before it is published: if persisting fails nothing goes out
//! and the task stays retryable; if publishing fails after persisting, the
//! next delivery sees the witness and stops, so the notification is lost
//! but the work is never repeated.

use super::{AgentRole, DeliveryHandler, DeliveryOutcome, WorkExecutor};
use crate::constants::{collections, fields};
use crate::error::{KiorgaError, Result};
use crate::logging::{log_delivery, log_error, log_task_operation};
use crate::messaging::{envelope, publish_with_confirmation, MessageBus};
use crate::models::{FinalReport, Task, TaskStatus};
use crate::state_machine::WorkerState;
use crate::store::{to_document, DocumentStore, DocumentUpdate, WriteMode};
use crate::validation::parse_and_validate_task;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Recorded as the executing agent on every report
    pub agent_id: String,
    pub reports_topic: String,
    /// Validate incoming tasks before working on them
    pub validate_tasks: bool,
    pub publish_timeout: Duration,
}

pub struct TaskWorker {
    store: Arc<dyn DocumentStore>,
    bus: Arc<dyn MessageBus>,
    work: Arc<dyn WorkExecutor>,
    settings: WorkerSettings,
}

impl std::fmt::Debug for TaskWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWorker")
            .field("settings", &self.settings)
            .finish()
    }
}

impl TaskWorker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        bus: Arc<dyn MessageBus>,
        work: Arc<dyn WorkExecutor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            bus,
            work,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Run the gate, work and report steps for a parsed task.
    ///
    /// Failures past the gate mark the task FAILED and always come back
    /// retryable.
    pub async fn process(&self, task: &Task) -> Result<DeliveryOutcome> {
        if self.already_reported(&task.task_id).await? {
            return Ok(DeliveryOutcome::Duplicate);
        }

        let mut state = WorkerState::Checked;
        match self.execute_and_report(task, &mut state).await {
            Ok(()) => Ok(DeliveryOutcome::Processed),
            Err(err) => {
                warn!(
                    task_id = %task.task_id,
                    state = %state,
                    error = %err,
                    "Task processing failed"
                );
                self.mark_status(&task.task_id, TaskStatus::Failed).await;

                if err.is_retryable() {
                    Err(err)
                } else {
                    Err(KiorgaError::unexpected(err.to_string()))
                }
            }
        }
    }

    async fn already_reported(&self, task_id: &str) -> Result<bool> {
        let reports = self
            .store
            .find_by_field(
                collections::FINAL_REPORTS,
                fields::TASK_ID,
                &Value::String(task_id.to_string()),
                1,
            )
            .await?;

        if reports.is_empty() {
            return Ok(false);
        }
        warn!(task_id = %task_id, "Task already reported, skipping");
        Ok(true)
    }

    async fn execute_and_report(&self, task: &Task, state: &mut WorkerState) -> Result<()> {
        self.mark_status(&task.task_id, TaskStatus::InProgress).await;
        self.advance(state, task);

        info!(task_id = %task.task_id, title = %task.title, "Starting work");
        let output = self.work.execute(task).await?;

        let report = FinalReport::success(&task.task_id, &self.settings.agent_id, output.summary);
        self.persist_report(&report).await?;
        self.publish_report(&report).await?;
        self.advance(state, task);

        self.mark_status(&task.task_id, TaskStatus::Completed).await;
        self.advance(state, task);
        Ok(())
    }

    fn advance(&self, state: &mut WorkerState, task: &Task) {
        let next = state.next().unwrap_or(*state);
        debug!(task_id = %task.task_id, from = %state, to = %next, "Worker state transition");
        *state = next;
    }

    async fn persist_report(&self, report: &FinalReport) -> Result<()> {
        self.store
            .set(
                collections::FINAL_REPORTS,
                &report.report_id,
                to_document(report)?,
                WriteMode::Replace,
            )
            .await?;

        log_task_operation(
            "persist_report",
            Some(&report.task_id),
            Some(&report.executing_agent_id),
            "saved",
            Some(&report.report_id),
        );
        Ok(())
    }

    async fn publish_report(&self, report: &FinalReport) -> Result<()> {
        let payload = envelope::encode(report)?;
        publish_with_confirmation(
            self.bus.as_ref(),
            &self.settings.reports_topic,
            &payload,
            self.settings.publish_timeout,
        )
        .await?;
        Ok(())
    }

    /// Best-effort status write; failures are logged and swallowed
    async fn mark_status(&self, task_id: &str, status: TaskStatus) {
        let update = match serde_json::to_value(status) {
            Ok(value) => DocumentUpdate::new()
                .set(fields::STATUS, value)
                .server_timestamp(fields::UPDATED_AT),
            Err(err) => {
                log_error("worker", "mark_status", &err.to_string(), Some(task_id));
                return;
            }
        };

        match self.store.update(collections::TASKS, task_id, update).await {
            Ok(()) => log_task_operation(
                "status",
                Some(task_id),
                Some(&self.settings.agent_id),
                &status.to_string(),
                None,
            ),
            Err(err) => log_error("worker", "mark_status", &err.to_string(), Some(task_id)),
        }
    }
}

#[async_trait]
impl DeliveryHandler for TaskWorker {
    fn role(&self) -> AgentRole {
        AgentRole::Worker
    }

    fn agent_id(&self) -> &str {
        &self.settings.agent_id
    }

    async fn handle_delivery(&self, envelope: &Value) -> Result<DeliveryOutcome> {
        let started = Instant::now();

        let message = envelope::decode(envelope)
            .inspect_err(|err| warn!(error = %err, "Rejecting delivery"))?;
        let task = parse_and_validate_task(&message.payload, self.settings.validate_tasks)
            .inspect_err(|err| warn!(error = %err, "Rejecting task"))?;
        info!(task_id = %task.task_id, title = %task.title, "Received task");

        let result = self.process(&task).await;
        match &result {
            Ok(outcome) => log_delivery(
                &self.role().to_string(),
                Some(&task.task_id),
                outcome.as_str(),
                started.elapsed().as_millis() as u64,
                message.receive_latency_seconds(),
            ),
            Err(err) => log_error(
                "worker",
                "handle_delivery",
                &err.to_string(),
                Some(&task.task_id),
            ),
        }
        result
    }
}
