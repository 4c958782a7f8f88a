//! Job or raw markup → printer-ready bitmap
//!
//! Both HTTP paths share this one routine; they differ only in where the
//! markup comes from.

pub mod bitmap;
pub mod rasterizer;
pub mod template;

pub use bitmap::Bitmap;
pub use rasterizer::{ChromeRasterizer, Rasterizer, Viewport};
pub use template::{receipt_markup, PriorityStyle};

use crate::config::AppConfig;
use crate::errors::{DaemonError, Result};
use crate::queue::PrintJob;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub enum RenderSource<'a> {
    /// Styled task receipt
    Job(&'a PrintJob),
    /// Caller-supplied document, printed without style injection
    Raw(&'a str),
}

pub struct Renderer {
    rasterizer: Arc<dyn Rasterizer>,
    width: u32,
    max_height: u32,
}

impl Renderer {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, width: u32, max_height: u32) -> Self {
        Self {
            rasterizer,
            width,
            max_height,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let rasterizer = ChromeRasterizer::new(config.browser_executable(), config.render_timeout());
        Self::new(Arc::new(rasterizer), config.print_width, config.render_max_height)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.max_height,
        }
    }

    pub fn markup<'a>(&self, source: RenderSource<'a>) -> Result<Cow<'a, str>> {
        match source {
            RenderSource::Job(job) => receipt_markup(job, self.width).map(Cow::Owned),
            RenderSource::Raw(html) => Ok(Cow::Borrowed(html)),
        }
    }

    /// Rasterize, trim, rescale and binarize
    pub async fn render(&self, source: RenderSource<'_>) -> Result<Bitmap> {
        let started = Instant::now();
        let html = self.markup(source)?;

        let page = self.rasterizer.rasterize(&html, self.viewport()).await?;
        let (page_width, page_height) = (page.width(), page.height());

        // Image work is CPU-bound; keep it off the async workers
        let width = self.width;
        let bitmap = tokio::task::spawn_blocking(move || bitmap::to_printable(&page, width))
            .await
            .map_err(|e| DaemonError::Render(format!("Bitmap task failed: {}", e)))??;

        debug!(
            page_width,
            page_height,
            width = bitmap.width(),
            height = bitmap.height(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Rendered bitmap"
        );

        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::Mutex;

    /// Draws a black band whose height is the number of `<br />` tags
    struct BandRasterizer {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Rasterizer for BandRasterizer {
        async fn rasterize(&self, html: &str, viewport: Viewport) -> Result<DynamicImage> {
            self.seen.lock().unwrap().push(html.to_string());
            let rows = 10 + 10 * html.matches("<br />").count() as u32;
            let img = GrayImage::from_fn(viewport.width, viewport.height, |_, y| {
                if (100..100 + rows).contains(&y) {
                    Luma([0])
                } else {
                    Luma([255])
                }
            });
            Ok(DynamicImage::ImageLuma8(img))
        }
    }

    struct BrokenRasterizer;

    #[async_trait]
    impl Rasterizer for BrokenRasterizer {
        async fn rasterize(&self, _html: &str, _viewport: Viewport) -> Result<DynamicImage> {
            Err(DaemonError::Render("engine crashed".to_string()))
        }
    }

    fn renderer() -> (Renderer, Arc<BandRasterizer>) {
        let rasterizer = Arc::new(BandRasterizer {
            seen: Mutex::new(Vec::new()),
        });
        (Renderer::new(rasterizer.clone(), 576, 2000), rasterizer)
    }

    #[tokio::test]
    async fn test_job_render_trims_to_content() {
        let (renderer, _) = renderer();
        let job = PrintJob::new(
            Some("T".into()),
            Some("line1\nline2".into()),
            Some("urgent".into()),
            None,
        );

        let bitmap = renderer.render(RenderSource::Job(&job)).await.unwrap();

        assert_eq!(bitmap.width(), 576);
        assert_eq!(bitmap.height(), 20);
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let (renderer, _) = renderer();
        let job = PrintJob::new(Some("Same".into()), Some("a\nb\nc".into()), None, None);

        let first = renderer.render(RenderSource::Job(&job)).await.unwrap();
        let second = renderer.render(RenderSource::Job(&job)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_raw_markup_is_passed_through_untouched() {
        let (renderer, rasterizer) = renderer();
        let html = "<html><body><h1>Raw</h1></body></html>";

        renderer.render(RenderSource::Raw(html)).await.unwrap();

        assert_eq!(rasterizer.seen.lock().unwrap().as_slice(), [html.to_string()]);
    }

    #[tokio::test]
    async fn test_rasterizer_failure_is_render_error() {
        let renderer = Renderer::new(Arc::new(BrokenRasterizer), 576, 2000);
        let result = renderer.render(RenderSource::Raw("<html></html>")).await;
        assert!(matches!(result, Err(DaemonError::Render(_))));
    }
}
