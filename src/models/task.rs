//! # Task Model
//!
//! The unit of work handed from the producer to the dispatcher and on to the
//! worker. One document per `task_id` lives in the `tasks` collection.
//!
//! `assigned_to_agent_id` doubles as the dispatcher's idempotency witness:
//! it is only written once the task has been delegated downstream.

use super::wire_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

wire_enum! {
    /// Lifecycle status of a task
    pub enum TaskStatus {
        /// Unset default; valid on the wire
        Unspecified = 0 => "TASK_STATUS_UNSPECIFIED",
        /// Created, not yet delegated
        Pending = 1 => "TASK_STATUS_PENDING",
        /// Delegated or being worked on
        InProgress = 2 => "TASK_STATUS_IN_PROGRESS",
        /// Work finished and reported
        Completed = 3 => "TASK_STATUS_COMPLETED",
        /// Work failed; may still be redelivered
        Failed = 4 => "TASK_STATUS_FAILED",
    }
}

wire_enum! {
    /// Priority requested by the creator
    pub enum TaskPriority {
        Unspecified = 0 => "TASK_PRIORITY_UNSPECIFIED",
        Low = 1 => "TASK_PRIORITY_LOW",
        Medium = 2 => "TASK_PRIORITY_MEDIUM",
        High = 3 => "TASK_PRIORITY_HIGH",
        Urgent = 4 => "TASK_PRIORITY_URGENT",
        Optional = 5 => "TASK_PRIORITY_OPTIONAL",
    }
}

impl TaskStatus {
    /// Check if this is a terminal state for a processing attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Status only ever moves forward: once a task has left `PENDING` it
    /// never returns there, and nothing transitions into an unset or
    /// unrecognized status.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match next {
            Self::Unspecified | Self::Unrecognized(_) => false,
            Self::Pending => matches!(self, Self::Unspecified | Self::Pending),
            _ => true,
        }
    }
}

/// Task document as exchanged on the bus and stored under `tasks/{taskId}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    #[serde(alias = "task_id")]
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(alias = "creator_agent_id")]
    pub creator_agent_id: String,
    #[serde(
        alias = "assigned_to_agent_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_agent_id: Option<String>,
    #[serde(alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(alias = "updated_at", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the dispatcher has already delegated this task
    pub fn is_assigned(&self) -> bool {
        self.assigned_to_agent_id
            .as_deref()
            .is_some_and(|agent| !agent.is_empty())
    }

    /// Seconds component of `created_at`, 0 when unset
    pub fn created_at_seconds(&self) -> i64 {
        self.created_at.map(|ts| ts.timestamp()).unwrap_or(0)
    }
}
