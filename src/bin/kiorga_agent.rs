//! # Kiorga Agent
//!
//! Runs the dispatcher or the worker, either behind the HTTP push endpoint
//! (`serve`) or as a pgmq queue consumer (`consume`).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use kiorga_core::agents::AgentRole;
use kiorga_core::bootstrap::{build_handler, Backends};
use kiorga_core::config::ConfigLoader;
use kiorga_core::logging::init_structured_logging;
use kiorga_core::messaging::QueueConsumer;
use kiorga_core::web::{create_router, AppState};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "kiorga-agent")]
#[command(about = "Run a Kiorga task delegation agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive push deliveries over HTTP
    Serve {
        #[arg(short, long, value_enum)]
        role: AgentRole,

        /// Overrides server.bind_address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Poll the role's inbound queue (postgres backend only)
    Consume {
        #[arg(short, long, value_enum)]
        role: AgentRole,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let backends = Backends::from_config(&config)
        .await
        .context("failed to initialize backends")?;

    match cli.command {
        Commands::Serve { role, bind } => {
            let handler = build_handler(role, &config, &backends);
            let address = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let listener = tokio::net::TcpListener::bind(&address)
                .await
                .with_context(|| format!("failed to bind {address}"))?;

            info!(role = %role, address = %address, "🚀 Agent listening for push deliveries");
            axum::serve(listener, create_router(AppState::new(handler)))
                .with_graceful_shutdown(async {
                    let _ = signal::ctrl_c().await;
                    info!("Shutdown signal received");
                })
                .await?;
        }
        Commands::Consume { role } => {
            let Some(pool) = backends.pool.clone() else {
                bail!("the consume command requires the postgres backend");
            };
            let handler = build_handler(role, &config, &backends);
            let consumer = QueueConsumer::new(pool, handler, config.consumer_settings(role))?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                let _ = signal::ctrl_c().await;
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            });

            consumer.run(shutdown_rx).await?;
        }
    }

    info!("Agent stopped");
    Ok(())
}
