use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use task_printer_daemon::api::{self, ApiState};
use task_printer_daemon::config::AppConfig;
use task_printer_daemon::sentry_init;
use task_printer_daemon::service::PrintService;
use task_printer_daemon::telemetry::{TelemetryCollector, TelemetryReporter};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Seconds between telemetry summary log lines
const TELEMETRY_REPORT_INTERVAL_SECS: u64 = 300;

/// Stdout logging, plus a daily rolling file when `log_dir` is set.
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false);

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "task-printer-daemon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    guard
}

/// Log lines become breadcrumbs only; Sentry events are captured explicitly
/// for dropped jobs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN | tracing::Level::INFO => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    let _log_guard = init_tracing(&config);

    info!("========================================");
    info!("Task Printer Service Starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("========================================");

    config.validate().context("Invalid configuration")?;

    // Must stay alive until exit so queued events are flushed
    let _sentry_guard = sentry_init::init();

    if let Some(browser) = config.browser_executable() {
        info!("Headless browser: {}", browser.display());
    }
    info!(
        "Printer: {} | Width: {} dots | Cooldown: {}s",
        config.printer_device, config.print_width, config.cooldown_secs
    );

    let telemetry = Arc::new(TelemetryCollector::new());
    let service = Arc::new(PrintService::from_config(&config, telemetry.clone()));

    let reporter = TelemetryReporter::new(telemetry.clone(), service.queue().clone())
        .start_reporting(TELEMETRY_REPORT_INTERVAL_SECS);

    let state = ApiState {
        service: service.clone(),
        telemetry,
    };

    let served = api::start_api_server(&config.bind_addr, state, shutdown_signal()).await;

    reporter.abort();
    info!(
        "Waiting for {} queued job(s) before exit",
        service.pending_jobs()
    );
    service.shutdown().await?;

    served?;
    info!("Task Printer Service stopped");
    Ok(())
}
