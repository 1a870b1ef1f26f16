//! # Final Report Model
//!
//! The terminal artifact of a processing attempt. Stored under
//! `final_reports/{reportId}` and published to the reports topic. Its
//! presence for a `taskId` is the worker's idempotency witness.

use super::wire_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

wire_enum! {
    /// Outcome recorded in a final report
    pub enum FinalStatus {
        Unspecified = 0 => "FINAL_STATUS_UNSPECIFIED",
        Success = 1 => "FINAL_STATUS_SUCCESS",
        Failure = 2 => "FINAL_STATUS_FAILURE",
    }
}

/// Completion report produced by the worker
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalReport {
    #[serde(alias = "report_id")]
    pub report_id: String,
    /// Weak reference to the task; the report does not own it
    #[serde(alias = "task_id")]
    pub task_id: String,
    #[serde(alias = "executing_agent_id")]
    pub executing_agent_id: String,
    #[serde(alias = "final_status")]
    pub final_status: FinalStatus,
    pub summary: String,
    #[serde(alias = "completion_timestamp", skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
}

impl FinalReport {
    /// Create a successful report with a fresh id, stamped now.
    ///
    /// The id is never derived from the task id, so every successful
    /// attempt produces a distinct report.
    pub fn success(
        task_id: impl Into<String>,
        executing_agent_id: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            executing_agent_id: executing_agent_id.into(),
            final_status: FinalStatus::Success,
            summary: summary.into(),
            completion_timestamp: Some(Utc::now()),
        }
    }
}
