//! # Agents
//!
//! The two delivery handlers of the delegation pipeline:
//!
//! - [`TaskDispatcher`] (LDA) persists incoming tasks and delegates them
//! - [`TaskWorker`] (SDA-BE) executes delegated tasks and reports the result
//!
//! Both are stateless per delivery and implement [`DeliveryHandler`], the
//! only thing the transport adapters (HTTP push, queue consumer) see.

pub mod dispatcher;
pub mod work;
pub mod worker;

pub use dispatcher::{DispatcherSettings, TaskDispatcher};
pub use work::{SimulatedWork, WorkExecutor, WorkOutput};
pub use worker::{TaskWorker, WorkerSettings};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which side of the pipeline a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Dispatcher,
    Worker,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatcher => write!(f, "dispatcher"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dispatcher" | "lda" => Ok(Self::Dispatcher),
            "worker" | "sda-be" | "sda_be" => Ok(Self::Worker),
            _ => Err(format!("Invalid agent role: {s}")),
        }
    }
}

/// Successful result of handling one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// All side effects of this delivery were applied
    Processed,
    /// An earlier delivery already did the work; nothing was changed
    Duplicate,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => crate::constants::outcomes::PROCESSED,
            Self::Duplicate => crate::constants::outcomes::DUPLICATE,
        }
    }
}

/// Handles one push envelope.
///
/// `Err` with a permanent class means the message must not be redelivered;
/// a transient `Err` asks the transport to redeliver.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    fn role(&self) -> AgentRole;

    fn agent_id(&self) -> &str;

    async fn handle_delivery(&self, envelope: &Value) -> Result<DeliveryOutcome>;
}
