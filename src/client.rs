//! HTTP client for submitting tasks to a running daemon.

use crate::api::{ErrorResponse, TaskRequest, TaskResponse};
use crate::errors::{DaemonError, Result};
use crate::queue::Priority;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Daemon address used when neither `--url` nor `PRINTER_URL` is given
pub const DEFAULT_PRINTER_URL: &str = "http://localhost:5000";

/// Priority tags offered to submitters
pub const PRIORITY_TAGS: &[&str] = &["low", "normal", "high", "urgent", "message", "info"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a task payload from user input.
///
/// The title is required after trimming. A blank due date is left out.
pub fn task_request(
    title: &str,
    description: &str,
    priority: &Priority,
    due_date: Option<&str>,
) -> Result<TaskRequest> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DaemonError::Validation("title is required".to_string()));
    }

    Ok(TaskRequest {
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        priority: Some(priority.label().to_string()),
        due_date: due_date
            .map(str::trim)
            .filter(|date| !date.is_empty())
            .map(String::from),
    })
}

pub struct TaskClient {
    client: Client,
    base_url: String,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("task-submit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST the task to `/print-task`.
    ///
    /// Any 2xx counts as accepted; the daemon answers `202` once the task is
    /// queued.
    pub async fn submit(&self, request: &TaskRequest) -> Result<TaskResponse> {
        let url = format!("{}/print-task", self.base_url);
        debug!("Submitting task to {}", url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(DaemonError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
