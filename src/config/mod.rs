//! # Configuration
//!
//! Typed configuration for the agents, loaded in layers by [`ConfigLoader`]:
//!
//! 1. built-in defaults
//! 2. a TOML file (`KIORGA_CONFIG`, or `config/kiorga.toml` when present)
//! 3. the deployment's legacy environment names (`TOPIC_LDA_TASKS`,
//!    `TOPIC_SDA_BE_TASKS`, `AGENT_ID_SDA_BE`, `TOPIC_REPORTS`,
//!    `DATABASE_URL`, `PORT`)
//! 4. `KIORGA__SECTION__KEY` overrides, e.g. `KIORGA__WORKER__VALIDATE_TASKS=false`

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use crate::agents::{AgentRole, DispatcherSettings, WorkerSettings};
use crate::constants::defaults;
use crate::messaging::ConsumerSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KiorgaConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub messaging: MessagingConfig,
    pub dispatcher: DispatcherConfig,
    pub worker: WorkerConfig,
    pub producer: ProducerConfig,
}

/// HTTP push endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::BIND_ADDRESS.to_string(),
        }
    }
}

/// Which store and bus implementations to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local store and bus; nothing survives a restart
    #[default]
    Memory,
    /// PostgreSQL documents and pgmq queues
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            database_url: None,
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Bound on waiting for a publish confirmation
    pub publish_timeout_seconds: u64,
    pub consumer: ConsumerConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            publish_timeout_seconds: defaults::PUBLISH_TIMEOUT_SECONDS,
            consumer: ConsumerConfig::default(),
        }
    }
}

/// Polling behaviour of the pgmq queue consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub visibility_timeout_seconds: i32,
    pub batch_size: i32,
    pub poll_interval_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_seconds: defaults::CONSUMER_VISIBILITY_TIMEOUT_SECONDS,
            batch_size: defaults::CONSUMER_BATCH_SIZE,
            poll_interval_ms: defaults::CONSUMER_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub agent_id: String,
    pub delegation_topic: String,
    pub assigned_agent_id: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            agent_id: defaults::DISPATCHER_AGENT_ID.to_string(),
            delegation_topic: defaults::DELEGATION_TOPIC.to_string(),
            assigned_agent_id: defaults::WORKER_AGENT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub agent_id: String,
    pub reports_topic: String,
    pub validate_tasks: bool,
    pub simulated_work_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            agent_id: defaults::WORKER_AGENT_ID.to_string(),
            reports_topic: defaults::REPORTS_TOPIC.to_string(),
            validate_tasks: true,
            simulated_work_ms: defaults::SIMULATED_WORK_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Topic the dispatcher consumes
    pub task_topic: String,
    pub creator_agent_id: String,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            task_topic: defaults::TASK_TOPIC.to_string(),
            creator_agent_id: defaults::PRODUCER_AGENT_ID.to_string(),
        }
    }
}

impl KiorgaConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.messaging.publish_timeout_seconds)
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            agent_id: self.dispatcher.agent_id.clone(),
            delegation_topic: self.dispatcher.delegation_topic.clone(),
            assigned_agent_id: self.dispatcher.assigned_agent_id.clone(),
            publish_timeout: self.publish_timeout(),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            agent_id: self.worker.agent_id.clone(),
            reports_topic: self.worker.reports_topic.clone(),
            validate_tasks: self.worker.validate_tasks,
            publish_timeout: self.publish_timeout(),
        }
    }

    /// Topic a role consumes
    pub fn inbound_topic(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::Dispatcher => &self.producer.task_topic,
            AgentRole::Worker => &self.dispatcher.delegation_topic,
        }
    }

    pub fn consumer_settings(&self, role: AgentRole) -> ConsumerSettings {
        let consumer = &self.messaging.consumer;
        ConsumerSettings {
            topic: self.inbound_topic(role).to_string(),
            visibility_timeout_seconds: consumer.visibility_timeout_seconds,
            batch_size: consumer.batch_size,
            poll_interval: Duration::from_millis(consumer.poll_interval_ms),
        }
    }

    pub fn simulated_work_duration(&self) -> Duration {
        Duration::from_millis(self.worker.simulated_work_ms)
    }

    /// Reject configurations the agents cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("server.bind_address", &self.server.bind_address),
            ("dispatcher.agent_id", &self.dispatcher.agent_id),
            ("dispatcher.delegation_topic", &self.dispatcher.delegation_topic),
            ("dispatcher.assigned_agent_id", &self.dispatcher.assigned_agent_id),
            ("worker.agent_id", &self.worker.agent_id),
            ("worker.reports_topic", &self.worker.reports_topic),
            ("producer.task_topic", &self.producer.task_topic),
            ("producer.creator_agent_id", &self.producer.creator_agent_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "agent configuration",
                ));
            }
        }

        if self.messaging.publish_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "messaging.publish_timeout_seconds",
                "0",
                "publish timeout must be greater than 0",
            ));
        }

        let consumer = &self.messaging.consumer;
        if consumer.batch_size <= 0 {
            return Err(ConfigurationError::invalid_value(
                "messaging.consumer.batch_size",
                consumer.batch_size.to_string(),
                "batch size must be greater than 0",
            ));
        }
        if consumer.visibility_timeout_seconds <= 0 {
            return Err(ConfigurationError::invalid_value(
                "messaging.consumer.visibility_timeout_seconds",
                consumer.visibility_timeout_seconds.to_string(),
                "visibility timeout must be greater than 0",
            ));
        }

        if self.backend.kind == BackendKind::Postgres {
            let has_url = self
                .backend
                .database_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty());
            if !has_url {
                return Err(ConfigurationError::missing_required_field(
                    "backend.database_url",
                    "postgres backend",
                ));
            }
            if self.backend.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "backend.max_connections",
                    "0",
                    "pool size must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KiorgaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.publish_timeout(), Duration::from_secs(30));
        assert!(config.worker.validate_tasks);
        assert_eq!(config.backend.kind, BackendKind::Memory);
    }

    #[test]
    fn test_inbound_topics_follow_role() {
        let config = KiorgaConfig::default();
        assert_eq!(config.inbound_topic(AgentRole::Dispatcher), "lda-tasks");
        assert_eq!(config.inbound_topic(AgentRole::Worker), "sda-be-tasks");
        assert_eq!(
            config.consumer_settings(AgentRole::Worker).poll_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_validation_rejects_empty_topic() {
        let mut config = KiorgaConfig::default();
        config.worker.reports_topic = "  ".into();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker.reports_topic"));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = KiorgaConfig::default();
        config.messaging.publish_timeout_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = KiorgaConfig::default();
        config.backend.kind = BackendKind::Postgres;
        assert!(config.validate().is_err());

        config.backend.database_url = Some("postgres://localhost/kiorga".into());
        assert!(config.validate().is_ok());
    }
}
