#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Kiorga Core
//!
//! Task delegation core for the Kiorga agents.
//!
//! ## Overview
//!
//! A producer publishes a task. The dispatcher (LDA) persists it and
//! delegates it to the worker topic. The worker (SDA-BE) executes it, then
//! persists and publishes a final report. The message bus delivers at least
//! once, so both handlers are idempotent: each checks a witness in the
//! document store before doing anything with side effects.
//!
//! ## Module Organization
//!
//! - [`agents`] - Dispatcher and worker delivery handlers
//! - [`messaging`] - Envelope codec, bus facade, pgmq bus and queue consumer
//! - [`store`] - Document store facade with in-memory and PostgreSQL backends
//! - [`models`] - Task and final report wire types
//! - [`validation`] - Field validation for inbound tasks
//! - [`state_machine`] - Per-delivery progress states
//! - [`web`] - HTTP push adapter
//! - [`config`] - Layered configuration
//! - [`producer`] - Task creation and publishing
//! - [`error`] - Error taxonomy and retry classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kiorga_core::agents::AgentRole;
//! use kiorga_core::bootstrap::{build_handler, Backends};
//! use kiorga_core::config::ConfigLoader;
//! use kiorga_core::web::{create_router, AppState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let backends = Backends::from_config(&config).await?;
//! let handler = build_handler(AgentRole::Dispatcher, &config, &backends);
//!
//! let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
//! axum::serve(listener, create_router(AppState::new(handler))).await?;
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod producer;
pub mod state_machine;
pub mod store;
pub mod validation;
pub mod web;

pub use agents::{AgentRole, DeliveryHandler, DeliveryOutcome, TaskDispatcher, TaskWorker};
pub use config::{ConfigLoader, KiorgaConfig};
pub use error::{ErrorClass, KiorgaError, Result};
pub use models::{FinalReport, Task};
