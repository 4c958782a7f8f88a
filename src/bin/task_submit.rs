//! task-submit: send one task to a running printer daemon

use anyhow::Context;
use clap::builder::PossibleValuesParser;
use clap::Parser;
use task_printer_daemon::client::{task_request, TaskClient, DEFAULT_PRINTER_URL, PRIORITY_TAGS};
use task_printer_daemon::queue::Priority;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "task-submit", version, about = "Queue a task receipt on the printer daemon")]
struct Cli {
    /// Daemon base URL
    #[arg(long, env = "PRINTER_URL", default_value = DEFAULT_PRINTER_URL)]
    url: String,

    /// Task title (required, surrounding whitespace is dropped)
    title: String,

    /// Longer description; newlines become line breaks on paper
    #[arg(short, long, default_value = "")]
    description: String,

    #[arg(
        short,
        long,
        default_value = "normal",
        value_parser = PossibleValuesParser::new(PRIORITY_TAGS)
    )]
    priority: String,

    /// Free-form due date, e.g. 2025-05-23
    #[arg(long)]
    due_date: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let request = task_request(
        &cli.title,
        &cli.description,
        &Priority::parse(&cli.priority),
        cli.due_date.as_deref(),
    )?;

    let client = TaskClient::new(&cli.url)?;
    let ack = client
        .submit(&request)
        .await
        .with_context(|| format!("Failed to send task to {}", cli.url))?;

    println!("✓ Task sent successfully!");
    println!("{}", serde_json::to_string_pretty(&ack)?);
    Ok(())
}
