//! # Agent Bootstrap
//!
//! Builds the store, bus and delivery handler a process needs from its
//! configuration. Clients are constructed once here and injected; nothing in
//! the library reaches for globals.

use crate::agents::{AgentRole, DeliveryHandler, SimulatedWork, TaskDispatcher, TaskWorker, WorkExecutor};
use crate::config::{BackendKind, KiorgaConfig};
use crate::error::{KiorgaError, Result};
use crate::messaging::{InMemoryMessageBus, MessageBus, PgmqMessageBus};
use crate::store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Store and bus shared by every delivery in a process
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub bus: Arc<dyn MessageBus>,
    /// Present for the postgres backend; the queue consumer needs it
    pub pool: Option<PgPool>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("postgres", &self.pool.is_some())
            .finish()
    }
}

impl Backends {
    /// Process-local store and bus
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryDocumentStore::new()),
            bus: Arc::new(InMemoryMessageBus::new()),
            pool: None,
        }
    }

    /// Connect the configured backend and prepare its schema and queues
    pub async fn from_config(config: &KiorgaConfig) -> Result<Self> {
        match config.backend.kind {
            BackendKind::Memory => {
                warn!("Using in-memory backend; published messages stay in this process");
                Ok(Self::in_memory())
            }
            BackendKind::Postgres => {
                let url = config.backend.database_url.as_deref().ok_or_else(|| {
                    KiorgaError::store("connect", "postgres backend requires a database url")
                })?;

                info!(max_connections = config.backend.max_connections, "🔌 Connecting to PostgreSQL");
                let pool = PgPoolOptions::new()
                    .max_connections(config.backend.max_connections)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(url)
                    .await?;

                let store = PostgresDocumentStore::with_pool(pool.clone());
                store.migrate().await?;

                let bus = PgmqMessageBus::new(pool.clone());
                for topic in [
                    config.producer.task_topic.as_str(),
                    config.dispatcher.delegation_topic.as_str(),
                    config.worker.reports_topic.as_str(),
                ] {
                    bus.ensure_topic(topic).await?;
                }

                Ok(Self {
                    store: Arc::new(store),
                    bus: Arc::new(bus),
                    pool: Some(pool),
                })
            }
        }
    }
}

/// Build the delivery handler for a role
pub fn build_handler(
    role: AgentRole,
    config: &KiorgaConfig,
    backends: &Backends,
) -> Arc<dyn DeliveryHandler> {
    let work: Arc<dyn WorkExecutor> = Arc::new(SimulatedWork::new(config.simulated_work_duration()));
    build_handler_with_work(role, config, backends, work)
}

/// Build the delivery handler for a role with a custom unit of work
pub fn build_handler_with_work(
    role: AgentRole,
    config: &KiorgaConfig,
    backends: &Backends,
    work: Arc<dyn WorkExecutor>,
) -> Arc<dyn DeliveryHandler> {
    match role {
        AgentRole::Dispatcher => Arc::new(TaskDispatcher::new(
            backends.store.clone(),
            backends.bus.clone(),
            config.dispatcher_settings(),
        )),
        AgentRole::Worker => Arc::new(TaskWorker::new(
            backends.store.clone(),
            backends.bus.clone(),
            work,
            config.worker_settings(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_builds_both_roles() {
        let config = KiorgaConfig::default();
        let backends = Backends::from_config(&config).await.unwrap();
        assert!(backends.pool.is_none());

        let dispatcher = build_handler(AgentRole::Dispatcher, &config, &backends);
        let worker = build_handler(AgentRole::Worker, &config, &backends);

        assert_eq!(dispatcher.role(), AgentRole::Dispatcher);
        assert_eq!(dispatcher.agent_id(), "agent-lda");
        assert_eq!(worker.role(), AgentRole::Worker);
        assert_eq!(worker.agent_id(), "agent-sda-be");
    }
}
