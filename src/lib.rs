//! Thermal task printer daemon.
//!
//! Accepts task and raw-HTML print requests over HTTP, renders them through a
//! headless browser into 1-bit bitmaps and streams them to an ESC/POS
//! printer, one job at a time.

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod escpos;
pub mod printer;
pub mod queue;
pub mod render;
pub mod sentry_init;
pub mod service;
pub mod status;
pub mod telemetry;
pub mod worker;
