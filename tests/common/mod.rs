// Common test utilities and fixtures

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use task_printer_daemon::errors::{DaemonError, Result};
use task_printer_daemon::printer::{PrinterManager, PrinterSink};
use task_printer_daemon::render::{Rasterizer, Renderer, Viewport};
use task_printer_daemon::service::PrintService;
use task_printer_daemon::telemetry::TelemetryCollector;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Instant;

/// Marker that makes [`MockRasterizer`] fail for that one document
#[allow(dead_code)]
pub const FAIL_MARKER: &str = "RENDER-FAIL";

/// One completed write to the mock printer
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct PrintRecord {
    pub data: Vec<u8>,
    pub started: Instant,
}

/// Mock printer sink for testing
#[derive(Clone)]
#[allow(dead_code)]
pub struct MockPrinter {
    pub writes: Arc<RwLock<Vec<PrintRecord>>>,
    pub should_fail: Arc<RwLock<bool>>,
    pub write_delay: Duration,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockPrinter {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every write takes `write_delay` before it completes
    pub fn with_delay(write_delay: Duration) -> Self {
        Self {
            writes: Arc::new(RwLock::new(Vec::new())),
            should_fail: Arc::new(RwLock::new(false)),
            write_delay,
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write().await = fail;
    }

    pub async fn get_print_count(&self) -> usize {
        self.writes.read().await.len()
    }

    pub async fn get_writes(&self) -> Vec<PrintRecord> {
        self.writes.read().await.clone()
    }

    /// Highest number of writes ever in flight at once
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrinterSink for MockPrinter {
    async fn print(&self, data: &[u8]) -> Result<()> {
        let started = Instant::now();
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if *self.should_fail.read().await {
            return Err(DaemonError::Printer("Simulated printer failure".to_string()));
        }

        self.writes.write().await.push(PrintRecord {
            data: data.to_vec(),
            started,
        });
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Deterministic stand-in for the headless browser.
///
/// Draws a black band starting at row 100 whose height is 10 rows plus 10 per
/// `<br />` in the document. Records every document it was handed.
#[derive(Clone)]
#[allow(dead_code)]
pub struct MockRasterizer {
    pub seen: Arc<RwLock<Vec<String>>>,
    pub always_fail: bool,
    /// When set, each call waits for one permit before drawing
    pub gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl MockRasterizer {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(RwLock::new(Vec::new())),
            always_fail: false,
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new()
        }
    }

    /// Blocks every render until a permit is added to the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let rasterizer = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (rasterizer, gate)
    }

    pub async fn documents(&self) -> Vec<String> {
        self.seen.read().await.clone()
    }
}

#[async_trait]
impl Rasterizer for MockRasterizer {
    async fn rasterize(&self, html: &str, viewport: Viewport) -> Result<DynamicImage> {
        self.seen.write().await.push(html.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| DaemonError::Render(e.to_string()))?
                .forget();
        }

        if self.always_fail || html.contains(FAIL_MARKER) {
            return Err(DaemonError::Render("Simulated browser crash".to_string()));
        }

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

/// A running service wired to mocks
#[allow(dead_code)]
pub struct TestHarness {
    pub service: Arc<PrintService>,
    pub telemetry: Arc<TelemetryCollector>,
    pub printer: MockPrinter,
    pub rasterizer: MockRasterizer,
}

#[allow(dead_code)]
pub fn start_service(
    rasterizer: MockRasterizer,
    printer: MockPrinter,
    cooldown: Duration,
) -> TestHarness {
    let telemetry = Arc::new(TelemetryCollector::new());
    let renderer = Arc::new(Renderer::new(Arc::new(rasterizer.clone()), 576, 2000));
    let manager = Arc::new(PrinterManager::new(Arc::new(printer.clone())));
    let service = Arc::new(PrintService::start(
        renderer,
        manager,
        telemetry.clone(),
        cooldown,
    ));

    TestHarness {
        service,
        telemetry,
        printer,
        rasterizer,
    }
}

/// Poll `check` until it holds, failing the test after `limit`
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    while !check().await {
        assert!(Instant::now() < deadline, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
