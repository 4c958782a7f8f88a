use crate::config::{AppConfig, PrinterAddress};
use crate::errors::{DaemonError, Result};
use crate::escpos::format_receipt;
use crate::render::Bitmap;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Connect timeout for network printers, independent of the write timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte sink that accepts one complete ESC/POS stream per call.
///
/// Implementations open the device, write, flush and close inside `print`;
/// nothing is held open between jobs.
#[async_trait]
pub trait PrinterSink: Send + Sync {
    async fn print(&self, data: &[u8]) -> Result<()>;

    /// Human-readable target, used in logs
    fn describe(&self) -> String;
}

/// Character device or plain file, e.g. `/dev/usb/lp0`
pub struct DevicePrinter {
    path: PathBuf,
    timeout: Duration,
}

impl DevicePrinter {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    async fn write_all(&self, data: &[u8]) -> Result<()> {
        // No `create`: a missing device node is an error, not a new file
        let mut device = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                DaemonError::Printer(format!("Failed to open {}: {}", self.path.display(), e))
            })?;

        device.write_all(data).await.map_err(|e| {
            DaemonError::Printer(format!("Write to {} failed: {}", self.path.display(), e))
        })?;
        device.flush().await.map_err(|e| {
            DaemonError::Printer(format!("Flush of {} failed: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl PrinterSink for DevicePrinter {
    #[tracing::instrument(skip(self, data), fields(device = %self.path.display(), bytes = data.len()))]
    async fn print(&self, data: &[u8]) -> Result<()> {
        tokio::time::timeout(self.timeout, self.write_all(data))
            .await
            .map_err(|_| {
                DaemonError::Printer(format!(
                    "Write timed out to {} ({} bytes)",
                    self.path.display(),
                    data.len()
                ))
            })?
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Raw TCP printer, typically port 9100. One connection per job.
pub struct NetworkPrinter {
    address: String,
    timeout: Duration,
}

impl NetworkPrinter {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PrinterSink for NetworkPrinter {
    #[tracing::instrument(skip(self, data), fields(address = %self.address, bytes = data.len()))]
    async fn print(&self, data: &[u8]) -> Result<()> {
        let address = &self.address;

        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| DaemonError::Printer(format!("Connection timed out to {}", address)))?
            .map_err(|e| DaemonError::Printer(format!("Connect to {} failed: {}", address, e)))?;

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| {
            DaemonError::Printer(format!(
                "Write timed out to {} ({} bytes)",
                address,
                data.len()
            ))
        })?
        .map_err(|e| DaemonError::Printer(format!("Write to {} failed: {}", address, e)))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// Owns the printer sink and serializes access to it.
///
/// Both the queue worker and the synchronous raw path go through
/// [`PrinterManager::print_bitmap`], so two receipts never interleave.
pub struct PrinterManager {
    sink: Arc<dyn PrinterSink>,
    lock: Mutex<()>,
}

impl PrinterManager {
    pub fn new(sink: Arc<dyn PrinterSink>) -> Self {
        info!(printer = %sink.describe(), "Initializing PrinterManager");
        Self {
            sink,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = config.printer_timeout();
        let sink: Arc<dyn PrinterSink> = match config.printer_address() {
            PrinterAddress::Device(path) => Arc::new(DevicePrinter::new(path, timeout)),
            PrinterAddress::Network(address) => Arc::new(NetworkPrinter::new(address, timeout)),
        };
        Self::new(sink)
    }

    pub fn describe(&self) -> String {
        self.sink.describe()
    }

    /// Encode and send one bitmap, holding the printer for the whole write
    pub async fn print_bitmap(&self, bitmap: &Bitmap) -> Result<()> {
        let data = format_receipt(bitmap);

        let _guard = self.lock.lock().await;
        let started = Instant::now();
        self.sink.print(&data).await?;

        debug!(
            printer = %self.sink.describe(),
            bytes = data.len(),
            rows = bitmap.height(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Bitmap sent to printer"
        );
        Ok(())
    }
}
