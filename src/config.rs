use crate::errors::{DaemonError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Dot width of standard 80mm thermal paper
pub const PRINT_WIDTH: u32 = 576;

/// Widest raster a `GS v 0` header can describe (16-bit byte count)
pub const MAX_PRINT_WIDTH: u32 = u16::MAX as u32 * 8;

/// Viewport height ceiling handed to the browser
pub const RENDER_MAX_HEIGHT: u32 = 2000;

/// Browser executables tried, in order, when `CHROME_PATH` is unset
pub const BROWSER_CANDIDATES: &[&str] = &["chromium", "chromium-browser", "google-chrome"];

#[derive(Debug, Clone, Parser)]
#[command(name = "task-printer-daemon", version, about)]
pub struct AppConfig {
    /// Address the HTTP API listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind_addr: String,

    /// Printer device path, or `tcp://host:port` for a network printer
    #[arg(long, env = "PRINTER_DEVICE", default_value = "/dev/usb/lp0")]
    pub printer_device: String,

    /// Headless browser executable used for rasterizing receipts
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Output bitmap width in dots
    #[arg(long, env = "PRINT_WIDTH", default_value_t = PRINT_WIDTH)]
    pub print_width: u32,

    /// Browser viewport height
    #[arg(long, env = "RENDER_MAX_HEIGHT", default_value_t = RENDER_MAX_HEIGHT)]
    pub render_max_height: u32,

    /// Pause after every job before the next dequeue
    #[arg(long, env = "COOLDOWN_SECS", default_value_t = 5)]
    pub cooldown_secs: u64,

    #[arg(long, env = "RENDER_TIMEOUT_SECS", default_value_t = 60)]
    pub render_timeout_secs: u64,

    #[arg(long, env = "PRINTER_TIMEOUT_SECS", default_value_t = 30)]
    pub printer_timeout_secs: u64,

    /// Directory for daily rolling log files (stdout only when unset)
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Where the receipt bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterAddress {
    /// Character device or plain file, e.g. `/dev/usb/lp0`
    Device(PathBuf),
    /// Raw TCP socket, e.g. `192.168.1.50:9100`
    Network(String),
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.print_width == 0 || self.print_width % 8 != 0 {
            return Err(DaemonError::Config(format!(
                "print width must be a positive multiple of 8, got {}",
                self.print_width
            )));
        }
        if self.print_width > MAX_PRINT_WIDTH {
            return Err(DaemonError::Config(format!(
                "print width must be at most {}, got {}",
                MAX_PRINT_WIDTH, self.print_width
            )));
        }
        if self.render_max_height == 0 {
            return Err(DaemonError::Config("render max height must be > 0".to_string()));
        }
        if self.render_timeout_secs == 0 || self.printer_timeout_secs == 0 {
            return Err(DaemonError::Config("timeouts must be > 0".to_string()));
        }
        if self.printer_device.trim().is_empty() {
            return Err(DaemonError::Config("printer device is empty".to_string()));
        }
        Ok(())
    }

    pub fn printer_address(&self) -> PrinterAddress {
        match self.printer_device.strip_prefix("tcp://") {
            Some(addr) => PrinterAddress::Network(addr.to_string()),
            None => PrinterAddress::Device(PathBuf::from(&self.printer_device)),
        }
    }

    /// Explicit `CHROME_PATH`, else the first candidate found on `PATH`
    pub fn browser_executable(&self) -> Option<PathBuf> {
        if let Some(path) = &self.chrome_path {
            return Some(path.clone());
        }
        let path_var = std::env::var_os("PATH")?;
        find_on_path(&path_var, BROWSER_CANDIDATES)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn printer_timeout(&self) -> Duration {
        Duration::from_secs(self.printer_timeout_secs)
    }
}

fn find_on_path(path_var: &std::ffi::OsStr, candidates: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
    candidates.iter().find_map(|name| {
        dirs.iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            printer_device: "/dev/usb/lp0".to_string(),
            chrome_path: None,
            print_width: PRINT_WIDTH,
            render_max_height: RENDER_MAX_HEIGHT,
            cooldown_secs: 5,
            render_timeout_secs: 60,
            printer_timeout_secs: 30,
            log_dir: None,
        }
    }
}
