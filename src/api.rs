use crate::errors::{DaemonError, Result};
use crate::queue::PrintJob;
use crate::service::PrintService;
use crate::status::WorkerState;
use crate::telemetry::TelemetryCollector;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Ack timestamp format, e.g. `20250523_142501_123456`
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// HTTP API server state
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PrintService>,
    pub telemetry: Arc<TelemetryCollector>,
}

/// Task payload. Every field is optional; defaults are applied by
/// [`PrintJob::new`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawRequest {
    pub html: Option<String>,
}

/// Print task acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub job_id: String,
    pub pending_jobs: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    pub pending_jobs: usize,
    pub worker: WorkerState,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let error_string = self.to_string();
        let (status, message) = match self {
            DaemonError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            DaemonError::Render(msg) | DaemonError::Printer(msg) | DaemonError::Queue(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            details: Some(error_string),
        });

        (status, body).into_response()
    }
}

/// Unwrap a JSON body into a non-empty object
fn json_object(
    payload: std::result::Result<Json<Value>, JsonRejection>,
    missing: &str,
) -> Result<serde_json::Map<String, Value>> {
    let Json(value) = payload.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        DaemonError::Validation(missing.to_string())
    })?;

    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(DaemonError::Validation(missing.to_string())),
    }
}

/// POST /print-task - Queue a task receipt
async fn handle_print_task(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    let body = json_object(payload, "No task data provided")?;
    let request: TaskRequest = serde_json::from_value(Value::Object(body))
        .map_err(|e| DaemonError::Validation(format!("Invalid task data: {}", e)))?;

    let job = PrintJob::new(
        request.title,
        request.description,
        request.priority,
        request.due_date,
    );
    let ack = state.service.enqueue(job).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskResponse {
            success: true,
            message: "Task queued for printing".to_string(),
            timestamp: ack.enqueued_at.format(TIMESTAMP_FORMAT).to_string(),
            job_id: ack.job_id,
            pending_jobs: ack.pending_jobs,
        }),
    ))
}

/// POST /print-raw - Render and print caller HTML immediately
async fn handle_print_raw(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<RawResponse>> {
    let body = json_object(payload, "No HTML provided")?;
    let html = match body.get("html") {
        Some(Value::String(html)) => html,
        _ => return Err(DaemonError::Validation("No HTML provided".to_string())),
    };

    state.service.print_raw(html).await?;

    Ok(Json(RawResponse {
        success: true,
        message: "Raw HTML printed".to_string(),
    }))
}

/// GET /queue - Pending depth and worker state
async fn handle_queue(State(state): State<ApiState>) -> Json<QueueResponse> {
    Json(QueueResponse {
        pending_jobs: state.service.pending_jobs(),
        worker: state.service.worker_state(),
    })
}

/// GET /health - Liveness
async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.service.uptime().as_secs(),
    })
}

/// GET /metrics - Telemetry metrics (Prometheus format)
async fn handle_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    state
        .telemetry
        .update_queue_depth(state.service.pending_jobs())
        .await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.telemetry.export_prometheus().await,
    )
}

/// Create HTTP API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/print-task", post(handle_print_task))
        .route("/print-raw", post(handle_print_raw))
        .route("/queue", get(handle_queue))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Start HTTP API server, returning once `shutdown` resolves and in-flight
/// requests have finished
pub async fn start_api_server<F>(addr: &str, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DaemonError::Config(format!("Cannot bind {}: {}", addr, e)))?;
    info!("Starting HTTP API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!("HTTP API server error: {}", e);
            DaemonError::Io(e)
        })
}
