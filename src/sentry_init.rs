use once_cell::sync::Lazy;
use regex::Regex;
use sentry::{ClientInitGuard, ClientOptions};
use std::env;
use std::sync::Arc;
use tracing::info;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("Invalid email regex pattern")
});

/// Initialize Sentry crash reporting
///
/// # Environment Variables
/// - `SENTRY_DSN`: Sentry Data Source Name (required, reporting is off without it)
/// - `SENTRY_ENVIRONMENT`: Environment name (default: "development")
/// - `SENTRY_RELEASE`: Release version (default: from Cargo.toml)
/// - `SENTRY_TRACES_SAMPLE_RATE`: Performance monitoring sample rate (default: 0.1)
///
/// The returned guard must be kept alive for the lifetime of the process.
pub fn init() -> Option<ClientInitGuard> {
    let dsn = match env::var("SENTRY_DSN").ok() {
        Some(d) if !d.is_empty() => d,
        _ => {
            info!("Sentry DSN not configured - crash reporting disabled");
            return None;
        }
    };

    let environment = env::var("SENTRY_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let release = env::var("SENTRY_RELEASE").unwrap_or_else(|_| {
        format!("{}@{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    });
    let traces_sample_rate = env::var("SENTRY_TRACES_SAMPLE_RATE")
        .ok()
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(0.1);

    let guard = sentry::init((
        dsn,
        ClientOptions {
            release: Some(release.into()),
            environment: Some(environment.into()),
            traces_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            before_send: Some(Arc::new(before_send_filter)),
            ..Default::default()
        },
    ));

    info!(
        "Sentry crash reporting initialized (environment: {})",
        guard.options().environment.as_deref().unwrap_or("unknown")
    );

    Some(guard)
}

/// Scrub e-mail addresses out of every free-text field and tag the event
/// with daemon metadata.
fn before_send_filter(
    mut event: sentry::protocol::Event<'static>,
) -> Option<sentry::protocol::Event<'static>> {
    if let Some(message) = event.message.as_mut() {
        *message = strip_emails(message);
    }

    for exception in &mut event.exception.values {
        if let Some(value) = exception.value.as_mut() {
            *value = strip_emails(value);
        }
    }

    for breadcrumb in &mut event.breadcrumbs.values {
        if let Some(message) = breadcrumb.message.as_mut() {
            *message = strip_emails(message);
        }
    }

    event
        .tags
        .insert("daemon_version".into(), env!("CARGO_PKG_VERSION").into());
    event.tags.insert("platform".into(), env::consts::OS.into());
    event.tags.insert("arch".into(), env::consts::ARCH.into());

    Some(event)
}

fn strip_emails(message: &str) -> String {
    EMAIL_REGEX
        .replace_all(message, "[EMAIL_REDACTED]")
        .into_owned()
}

/// Capture a dropped print job. A no-op when Sentry is not initialized.
///
/// - `job_id`: queue job id, or `"raw"` for `/print-raw`
/// - `kind`: failure class from `DaemonError::kind()`
pub fn capture_print_job_failure(job_id: &str, kind: &str, error: &str) {
    sentry::with_scope(
        |scope| {
            scope.set_tag("event_type", "print_job_failure");
            scope.set_tag("failure_kind", kind);
            scope.set_context(
                "print_job",
                sentry::protocol::Context::Other(sentry::protocol::Map::from_iter(vec![(
                    "job_id".to_string(),
                    job_id.into(),
                )])),
            );
        },
        || {
            sentry::capture_message(
                &format!("Print job failed: {}", strip_emails(error)),
                sentry::Level::Error,
            );
        },
    );
}
