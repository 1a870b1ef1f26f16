//! Shared fixtures and fault-injecting fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kiorga_core::agents::{
    DispatcherSettings, TaskDispatcher, TaskWorker, WorkExecutor, WorkOutput, WorkerSettings,
};
use kiorga_core::error::{KiorgaError, Result};
use kiorga_core::messaging::{envelope, InMemoryMessageBus, MessageBus, PublishedMessage};
use kiorga_core::models::{Task, TaskPriority, TaskStatus};
use kiorga_core::store::{Document, DocumentStore, DocumentUpdate, InMemoryDocumentStore, WriteMode};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TASK_TOPIC: &str = "lda-tasks";
pub const DELEGATION_TOPIC: &str = "sda-be-tasks";
pub const REPORTS_TOPIC: &str = "final-reports";
pub const DISPATCHER_AGENT_ID: &str = "agent-lda";
pub const WORKER_AGENT_ID: &str = "agent-sda-be";

/// A valid PENDING task
pub fn task(task_id: &str) -> Task {
    Task {
        task_id: task_id.to_string(),
        title: "Initial MVP setup".to_string(),
        description: "Create the base infrastructure for a new customer".to_string(),
        status: TaskStatus::Pending,
        priority: TaskPriority::High,
        creator_agent_id: "user-philipp".to_string(),
        assigned_to_agent_id: None,
        created_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()),
        updated_at: None,
    }
}

/// Push envelope carrying a domain object as its payload
pub fn envelope_for<T: Serialize>(message: &T) -> Value {
    raw_envelope(&envelope::encode(message).unwrap())
}

/// Push envelope carrying arbitrary payload text
pub fn raw_envelope(payload: &str) -> Value {
    envelope::wrap(payload, Some(Utc::now()), Some("test-message"))
}

/// Re-wrap a captured bus message as the next hop's delivery
pub fn redeliver(message: &PublishedMessage) -> Value {
    envelope::wrap(&message.payload, Some(message.published_at), Some(&message.message_id))
}

pub fn dispatcher_settings() -> DispatcherSettings {
    DispatcherSettings {
        agent_id: DISPATCHER_AGENT_ID.to_string(),
        delegation_topic: DELEGATION_TOPIC.to_string(),
        assigned_agent_id: WORKER_AGENT_ID.to_string(),
        publish_timeout: Duration::from_secs(30),
    }
}

pub fn worker_settings() -> WorkerSettings {
    WorkerSettings {
        agent_id: WORKER_AGENT_ID.to_string(),
        reports_topic: REPORTS_TOPIC.to_string(),
        validate_tasks: true,
        publish_timeout: Duration::from_secs(30),
    }
}

/// In-memory store that fails chosen operations on demand
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryDocumentStore,
    failing_reads: Mutex<bool>,
    failing_sets: Mutex<HashSet<String>>,
    failing_updates: Mutex<HashSet<String>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    pub fn fail_reads(&self) {
        *self.failing_reads.lock() = true;
    }

    pub fn fail_sets_to(&self, collection: &str) {
        self.failing_sets.lock().insert(collection.to_string());
    }

    pub fn fail_updates_to(&self, collection: &str) {
        self.failing_updates.lock().insert(collection.to_string());
    }

    pub fn heal(&self) {
        *self.failing_reads.lock() = false;
        self.failing_sets.lock().clear();
        self.failing_updates.lock().clear();
    }

    pub fn write_count(&self) -> u64 {
        self.inner.write_count()
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.inner.documents(collection)
    }

    /// Current document, bypassing fault injection
    pub async fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner.get(collection, id).await.unwrap()
    }

    pub async fn seed(&self, collection: &str, id: &str, document: Value) {
        let document = document.as_object().cloned().unwrap();
        self.inner
            .set(collection, id, document, WriteMode::Replace)
            .await
            .unwrap();
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        if *self.failing_reads.lock() {
            return Err(KiorgaError::store("get", "injected read failure"));
        }
        self.inner.get(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        mode: WriteMode,
    ) -> Result<()> {
        if self.failing_sets.lock().contains(collection) {
            return Err(KiorgaError::store("set", "injected write failure"));
        }
        self.inner.set(collection, id, document, mode).await
    }

    async fn update(&self, collection: &str, id: &str, update: DocumentUpdate) -> Result<()> {
        if self.failing_updates.lock().contains(collection) {
            return Err(KiorgaError::store("update", "injected update failure"));
        }
        self.inner.update(collection, id, update).await
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        if *self.failing_reads.lock() {
            return Err(KiorgaError::store("query", "injected read failure"));
        }
        self.inner.find_by_field(collection, field, value, limit).await
    }
}

/// In-memory bus that rejects publishes to chosen topics
#[derive(Debug, Default)]
pub struct FaultyBus {
    inner: InMemoryMessageBus,
    failing_topics: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
}

impl FaultyBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryMessageBus {
        &self.inner
    }

    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().insert(topic.to_string());
    }

    pub fn heal(&self) {
        self.failing_topics.lock().clear();
    }

    /// Publish calls, including rejected ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.inner.published_to(topic)
    }
}

#[async_trait]
impl MessageBus for FaultyBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_topics.lock().contains(topic) {
            return Err(KiorgaError::bus(topic, "injected publish failure"));
        }
        self.inner.publish(topic, payload).await
    }
}

/// Work executor that counts executions and can fail a number of times
#[derive(Debug, Default)]
pub struct CountingWork {
    executions: AtomicUsize,
    failures_left: AtomicUsize,
}

impl CountingWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            executions: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(times),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkExecutor for CountingWork {
    async fn execute(&self, task: &Task) -> Result<WorkOutput> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(KiorgaError::unexpected(format!(
                "work on {} failed",
                task.task_id
            )));
        }
        Ok(WorkOutput {
            summary: format!("completed {}", task.task_id),
        })
    }
}

/// Dispatcher and worker sharing one faulty store and bus
pub struct Pipeline {
    pub store: Arc<FaultyStore>,
    pub bus: Arc<FaultyBus>,
    pub work: Arc<CountingWork>,
    pub dispatcher: TaskDispatcher,
    pub worker: TaskWorker,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_work(CountingWork::new(), worker_settings())
    }

    pub fn with_work(work: CountingWork, worker_settings: WorkerSettings) -> Self {
        let store = Arc::new(FaultyStore::new());
        let bus = Arc::new(FaultyBus::new());
        let work = Arc::new(work);

        let dispatcher = TaskDispatcher::new(store.clone(), bus.clone(), dispatcher_settings());
        let worker = TaskWorker::new(store.clone(), bus.clone(), work.clone(), worker_settings);

        Self {
            store,
            bus,
            work,
            dispatcher,
            worker,
        }
    }
}
