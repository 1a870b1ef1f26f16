//! # Publish Task
//!
//! Creates a task, validates it and publishes it to the dispatcher's topic.
//! With `--print-envelope` the task is printed as a push envelope instead,
//! ready to POST to a locally running dispatcher.

use anyhow::Context;
use clap::Parser;
use kiorga_core::bootstrap::Backends;
use kiorga_core::config::ConfigLoader;
use kiorga_core::messaging::envelope;
use kiorga_core::models::TaskPriority;
use kiorga_core::producer::{publish_task, TaskDraft};
use kiorga_core::validation::{validate_task, FieldError};

#[derive(Parser)]
#[command(name = "publish-task")]
#[command(about = "Create and publish a Kiorga task")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[arg(short, long)]
    title: String,

    #[arg(short, long)]
    description: String,

    /// Priority name, e.g. TASK_PRIORITY_URGENT
    #[arg(short, long, default_value = "TASK_PRIORITY_MEDIUM")]
    priority: TaskPriority,

    /// Overrides producer.creator_agent_id
    #[arg(short, long)]
    creator: Option<String>,

    /// Print the push envelope instead of publishing
    #[arg(long)]
    print_envelope: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;

    let task = TaskDraft::new(cli.title, cli.description)
        .priority(cli.priority)
        .creator(cli.creator.unwrap_or_else(|| config.producer.creator_agent_id.clone()))
        .build();

    if cli.print_envelope {
        let errors = validate_task(&task);
        if !errors.is_empty() {
            anyhow::bail!("task is invalid: {}", FieldError::join(&errors));
        }
        let payload = envelope::encode(&task)?;
        let wrapped = envelope::wrap(&payload, Some(chrono::Utc::now()), None);
        println!("{}", serde_json::to_string_pretty(&wrapped)?);
        return Ok(());
    }

    kiorga_core::logging::init_structured_logging();
    let backends = Backends::from_config(&config)
        .await
        .context("failed to initialize backends")?;

    let message_id = publish_task(
        backends.bus.as_ref(),
        &config.producer.task_topic,
        &task,
        config.publish_timeout(),
    )
    .await?;

    println!("Published task {} as message {}", task.task_id, message_id);
    Ok(())
}
