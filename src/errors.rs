use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Printer error: {0}")]
    Printer(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
}

impl DaemonError {
    /// Short failure class used for telemetry labels
    pub fn kind(&self) -> &'static str {
        match self {
            DaemonError::Config(_) => "config",
            DaemonError::Validation(_) => "validation",
            DaemonError::Render(_) => "render",
            DaemonError::Printer(_) => "printer",
            DaemonError::Queue(_) => "queue",
            DaemonError::Io(_) => "io",
            DaemonError::Json(_) => "json",
            DaemonError::Http(_) => "http",
            DaemonError::Server { .. } => "server",
        }
    }
}

impl From<image::ImageError> for DaemonError {
    fn from(e: image::ImageError) -> Self {
        DaemonError::Render(format!("Image decode failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
