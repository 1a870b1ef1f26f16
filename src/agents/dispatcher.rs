//! # Task Dispatcher (LDA)
//!
//! Receives new tasks, records them in the `tasks` collection and delegates
//! them to the worker topic. Per delivery the handler walks
//! `RECEIVED → PERSISTED → DELEGATED → CONFIRMED`.
//!
//! The idempotency witness is `assignedToAgentId` on the task document. It
//! is written only in the confirm step, after the delegation publish
//! succeeded, so a crash anywhere before confirmation leaves the task
//! eligible for a full retry. The price is a possible duplicate publish,
//! which the worker absorbs with its own witness.
//!
//! The witness check is a plain read followed by a write. Two deliveries of
//! the same task racing through it can both delegate.

use super::{AgentRole, DeliveryHandler, DeliveryOutcome};
use crate::constants::{collections, fields};
use crate::error::Result;
use crate::logging::{log_delivery, log_error, log_task_operation};
use crate::messaging::{envelope, publish_with_confirmation, MessageBus};
use crate::models::{Task, TaskStatus};
use crate::state_machine::DispatcherState;
use crate::store::{to_document, Document, DocumentStore, DocumentUpdate, WriteMode};
use crate::validation::parse_and_validate_task;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Id this dispatcher reports itself as
    pub agent_id: String,
    /// Topic the worker consumes
    pub delegation_topic: String,
    /// Agent recorded as the assignee after delegation
    pub assigned_agent_id: String,
    pub publish_timeout: Duration,
}

pub struct TaskDispatcher {
    store: Arc<dyn DocumentStore>,
    bus: Arc<dyn MessageBus>,
    settings: DispatcherSettings,
}

impl std::fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("settings", &self.settings)
            .finish()
    }
}

impl TaskDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        bus: Arc<dyn MessageBus>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            store,
            bus,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Run the persist, delegate and confirm steps for a parsed task
    pub async fn dispatch(&self, task: &Task) -> Result<DeliveryOutcome> {
        let mut state = DispatcherState::Received;

        if !self.persist(task).await? {
            return Ok(DeliveryOutcome::Duplicate);
        }
        state = self.advance(state, task);

        self.delegate(task).await?;
        state = self.advance(state, task);

        self.confirm(task).await?;
        self.advance(state, task);

        Ok(DeliveryOutcome::Processed)
    }

    fn advance(&self, state: DispatcherState, task: &Task) -> DispatcherState {
        let next = state.next().unwrap_or(state);
        debug!(task_id = %task.task_id, from = %state, to = %next, "Dispatcher state transition");
        next
    }

    /// Merge the task into its document unless it was already delegated.
    ///
    /// Returns `false` for a duplicate delivery.
    async fn persist(&self, task: &Task) -> Result<bool> {
        let existing = self.store.get(collections::TASKS, &task.task_id).await?;
        let mut document = persistable_fields(task)?;

        if let Some(existing) = existing {
            if let Some(assignee) = assigned_agent(&existing) {
                warn!(
                    task_id = %task.task_id,
                    assigned_to = %assignee,
                    "Task already assigned, skipping"
                );
                return Ok(false);
            }

            if let Some(stored) = stored_status(&existing) {
                if !stored.can_transition_to(task.status) {
                    debug!(
                        task_id = %task.task_id,
                        stored = %stored,
                        incoming = %task.status,
                        "Keeping stored status"
                    );
                    document.remove(fields::STATUS);
                }
            }
        }

        self.store
            .set(collections::TASKS, &task.task_id, document, WriteMode::Merge)
            .await?;

        log_task_operation(
            "persist",
            Some(&task.task_id),
            Some(&self.settings.agent_id),
            "saved",
            None,
        );
        Ok(true)
    }

    async fn delegate(&self, task: &Task) -> Result<()> {
        info!(
            task_id = %task.task_id,
            assignee = %self.settings.assigned_agent_id,
            topic = %self.settings.delegation_topic,
            "Delegating task"
        );

        let payload = envelope::encode(task)?;
        publish_with_confirmation(
            self.bus.as_ref(),
            &self.settings.delegation_topic,
            &payload,
            self.settings.publish_timeout,
        )
        .await?;
        Ok(())
    }

    async fn confirm(&self, task: &Task) -> Result<()> {
        let update = DocumentUpdate::new()
            .set(fields::STATUS, serde_json::to_value(TaskStatus::InProgress)?)
            .set(
                fields::ASSIGNED_TO_AGENT_ID,
                self.settings.assigned_agent_id.as_str(),
            )
            .server_timestamp(fields::UPDATED_AT);

        self.store
            .update(collections::TASKS, &task.task_id, update)
            .await?;

        log_task_operation(
            "confirm",
            Some(&task.task_id),
            Some(&self.settings.assigned_agent_id),
            &TaskStatus::InProgress.to_string(),
            None,
        );
        Ok(())
    }
}

#[async_trait]
impl DeliveryHandler for TaskDispatcher {
    fn role(&self) -> AgentRole {
        AgentRole::Dispatcher
    }

    fn agent_id(&self) -> &str {
        &self.settings.agent_id
    }

    async fn handle_delivery(&self, envelope: &Value) -> Result<DeliveryOutcome> {
        let started = Instant::now();

        let message = envelope::decode(envelope)
            .inspect_err(|err| warn!(error = %err, "Rejecting delivery"))?;
        let task = parse_and_validate_task(&message.payload, true)
            .inspect_err(|err| warn!(error = %err, "Rejecting task"))?;

        let result = self.dispatch(&task).await;
        match &result {
            Ok(outcome) => log_delivery(
                &self.role().to_string(),
                Some(&task.task_id),
                outcome.as_str(),
                started.elapsed().as_millis() as u64,
                message.receive_latency_seconds(),
            ),
            Err(err) => log_error(
                "dispatcher",
                "handle_delivery",
                &err.to_string(),
                Some(&task.task_id),
            ),
        }
        result
    }
}

/// Fields written by the persist step.
///
/// Unset fields are left out so the merge keeps whatever the stored document
/// already has, and the assignee is never taken from the sender.
fn persistable_fields(task: &Task) -> Result<Document> {
    let defaults = to_document(&Task::default())?;
    let mut document = to_document(task)?;
    document.retain(|field, value| defaults.get(field) != Some(value));
    document.remove(fields::ASSIGNED_TO_AGENT_ID);
    Ok(document)
}

fn assigned_agent(document: &Document) -> Option<&str> {
    document
        .get(fields::ASSIGNED_TO_AGENT_ID)
        .and_then(Value::as_str)
        .filter(|agent| !agent.is_empty())
}

fn stored_status(document: &Document) -> Option<TaskStatus> {
    let status = document.get(fields::STATUS)?.clone();
    match serde_json::from_value(status) {
        Ok(status) => Some(status),
        Err(err) => {
            warn!(error = %err, "Stored task status is unreadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn task() -> Task {
        Task {
            task_id: "t-1".into(),
            title: "Write report".into(),
            description: "Quarterly numbers".into(),
            status: TaskStatus::Pending,
            priority: TaskPriority::High,
            creator_agent_id: "agent-user".into(),
            assigned_to_agent_id: Some("spoofed".into()),
            created_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    #[test]
    fn test_persistable_fields_drop_unset_and_assignee() {
        let mut task = task();
        task.description.clear();
        task.priority = TaskPriority::Unspecified;

        let document = persistable_fields(&task).unwrap();

        assert_eq!(document["taskId"], json!("t-1"));
        assert_eq!(document["status"], json!("TASK_STATUS_PENDING"));
        assert!(!document.contains_key("description"));
        assert!(!document.contains_key("priority"));
        assert!(!document.contains_key("assignedToAgentId"));
        assert!(!document.contains_key("updatedAt"));
    }

    #[test]
    fn test_assigned_agent_ignores_empty_witness() {
        let empty = json!({"assignedToAgentId": ""});
        let set = json!({"assignedToAgentId": "agent-sda-be"});

        assert_eq!(assigned_agent(empty.as_object().unwrap()), None);
        assert_eq!(
            assigned_agent(set.as_object().unwrap()),
            Some("agent-sda-be")
        );
    }

    #[test]
    fn test_stored_status_accepts_names_and_numbers() {
        let by_name = json!({"status": "TASK_STATUS_COMPLETED"});
        let by_number = json!({"status": 2});
        let missing = json!({});

        assert_eq!(
            stored_status(by_name.as_object().unwrap()),
            Some(TaskStatus::Completed)
        );
        assert_eq!(
            stored_status(by_number.as_object().unwrap()),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(stored_status(missing.as_object().unwrap()), None);
    }
}
