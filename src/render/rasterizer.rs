//! HTML → raster image through an out-of-process headless browser

use crate::errors::{DaemonError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Browser window size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Anything that can turn a complete HTML document into pixels
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, html: &str, viewport: Viewport) -> Result<DynamicImage>;
}

/// Chromium-family browser driven through `--headless --screenshot`
#[derive(Debug, Clone)]
pub struct ChromeRasterizer {
    executable: Option<PathBuf>,
    timeout: Duration,
}

const PAGE_FILE: &str = "page.html";
const SCREENSHOT_FILE: &str = "screenshot.png";

impl ChromeRasterizer {
    /// `executable` may be `None` when discovery found nothing; every render
    /// then fails instead of the daemon refusing to start.
    pub fn new(executable: Option<PathBuf>, timeout: Duration) -> Self {
        if executable.is_none() {
            warn!("No headless browser found - set CHROME_PATH; renders will fail");
        }
        Self {
            executable,
            timeout,
        }
    }

    fn command(&self, executable: &Path, viewport: Viewport, page: &str, shot: &str) -> Command {
        let mut cmd = Command::new(executable);
        cmd.args([
            "--headless",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--hide-scrollbars",
        ])
        .arg(format!("--window-size={},{}", viewport.width, viewport.height))
        .arg(format!("--screenshot={}", shot))
        .arg(page)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Rasterizer for ChromeRasterizer {
    #[instrument(skip(self, html), fields(html_len = html.len()))]
    async fn rasterize(&self, html: &str, viewport: Viewport) -> Result<DynamicImage> {
        let executable = self.executable.as_ref().ok_or_else(|| {
            DaemonError::Render("No headless browser executable available".to_string())
        })?;

        let scratch = tempfile::tempdir()
            .map_err(|e| DaemonError::Render(format!("Failed to create scratch dir: {}", e)))?;
        let page_path = scratch.path().join(PAGE_FILE);
        let shot_path = scratch.path().join(SCREENSHOT_FILE);
        tokio::fs::write(&page_path, html)
            .await
            .map_err(|e| DaemonError::Render(format!("Failed to write page: {}", e)))?;

        let page_url = format!("file://{}", page_path.display());
        let shot_arg = shot_path.display().to_string();
        let mut cmd = self.command(executable, viewport, &page_url, &shot_arg);

        debug!(browser = %executable.display(), "Launching headless browser");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                DaemonError::Render(format!(
                    "Browser timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                DaemonError::Render(format!(
                    "Failed to launch browser {}: {}",
                    executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DaemonError::Render(format!(
                "Browser exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("")
            )));
        }

        let png = tokio::fs::read(&shot_path).await.map_err(|e| {
            DaemonError::Render(format!("Browser produced no screenshot: {}", e))
        })?;

        Ok(image::load_from_memory(&png)?)
    }
}
