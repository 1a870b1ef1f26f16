//! # System Constants
//!
//! Collection names, document field names and deployment defaults shared by
//! the dispatcher, the worker and the producer.

/// Document store collections
pub mod collections {
    /// One document per task, keyed by task id
    pub const TASKS: &str = "tasks";
    /// One document per report, keyed by report id, queried by `taskId`
    pub const FINAL_REPORTS: &str = "final_reports";
}

/// Wire field names written by partial updates and queries
pub mod fields {
    pub const TASK_ID: &str = "taskId";
    pub const STATUS: &str = "status";
    pub const ASSIGNED_TO_AGENT_ID: &str = "assignedToAgentId";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Defaults used when configuration leaves a value unset
pub mod defaults {
    pub const PUBLISH_TIMEOUT_SECONDS: u64 = 30;

    pub const TASK_TOPIC: &str = "lda-tasks";
    pub const DELEGATION_TOPIC: &str = "sda-be-tasks";
    pub const REPORTS_TOPIC: &str = "final-reports";

    pub const DISPATCHER_AGENT_ID: &str = "agent-lda";
    pub const WORKER_AGENT_ID: &str = "agent-sda-be";
    pub const PRODUCER_AGENT_ID: &str = "agent-producer";

    /// Duration of the stand-in unit of work
    pub const SIMULATED_WORK_MS: u64 = 2_000;
    pub const SIMULATED_WORK_SUMMARY: &str =
        "SDA-BE has successfully completed the simulated task.";

    pub const BIND_ADDRESS: &str = "0.0.0.0:8080";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;

    pub const CONSUMER_VISIBILITY_TIMEOUT_SECONDS: i32 = 60;
    pub const CONSUMER_BATCH_SIZE: i32 = 10;
    pub const CONSUMER_POLL_INTERVAL_MS: u64 = 500;
}

/// Outcome labels used in structured log events
pub mod outcomes {
    pub const PROCESSED: &str = "processed";
    pub const DUPLICATE: &str = "duplicate";
}
