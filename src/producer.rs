//! # Task Producer
//!
//! Creates new tasks and publishes them to the dispatcher's topic. Tasks are
//! validated before publishing, so an invalid draft never reaches the bus.

use crate::error::{KiorgaError, Result};
use crate::messaging::{envelope, publish_with_confirmation, MessageBus};
use crate::models::{Task, TaskPriority, TaskStatus};
use crate::validation::validate_task;
use chrono::Utc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Builder for a new task
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    title: String,
    description: String,
    priority: TaskPriority,
    creator_agent_id: String,
    task_id: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn creator(mut self, creator_agent_id: impl Into<String>) -> Self {
        self.creator_agent_id = creator_agent_id.into();
        self
    }

    /// Use a fixed id instead of a fresh UUID
    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// A PENDING task created now
    pub fn build(self) -> Task {
        Task {
            task_id: self
                .task_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            description: self.description,
            status: TaskStatus::Pending,
            priority: self.priority,
            creator_agent_id: self.creator_agent_id,
            assigned_to_agent_id: None,
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }
}

/// Validate a task and publish it, returning the bus message id
pub async fn publish_task(
    bus: &dyn MessageBus,
    topic: &str,
    task: &Task,
    timeout: Duration,
) -> Result<String> {
    let errors = validate_task(task);
    if !errors.is_empty() {
        return Err(KiorgaError::validation(errors));
    }

    let payload = envelope::encode(task)?;
    let message_id = publish_with_confirmation(bus, topic, &payload, timeout).await?;

    info!(task_id = %task.task_id, topic = %topic, message_id = %message_id, "Task published");
    Ok(message_id)
}
