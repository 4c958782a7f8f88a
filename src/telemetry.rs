use crate::queue::PrintQueue;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Samples and events kept in memory
const HISTORY_LIMIT: usize = 1000;

/// Failures listed per report at most
const REPORTED_FAILURES_LIMIT: usize = 10;

/// Which path a printed bitmap came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// Taken off the queue by the worker
    Queue,
    /// Synchronous `/print-raw` request
    Raw,
}

/// Telemetry event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Task accepted into the queue
    JobEnqueued { job_id: String, pending_jobs: usize },
    /// Bitmap fully written to the printer
    PrintJobCompleted {
        job_id: String,
        source: JobSource,
        duration_ms: u64,
    },
    /// Render or printer failure; the job is gone
    PrintJobFailed {
        job_id: String,
        source: JobSource,
        /// `DaemonError::kind()` of the failure
        kind: String,
        error: String,
    },
}

/// Telemetry metrics for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMetrics {
    /// Tasks accepted by `/print-task`
    pub total_jobs_enqueued: u64,
    /// Print jobs completed, both paths
    pub total_jobs_completed: u64,
    /// Print jobs failed, both paths
    pub total_jobs_failed: u64,
    /// Failures while rasterizing or converting
    pub render_failures: u64,
    /// Failures while opening or writing the device
    pub printer_failures: u64,
    /// Average render + print duration (milliseconds)
    pub avg_print_duration_ms: u64,
    /// Success rate (0.0 - 1.0)
    pub success_rate: f64,
    /// Queue depth at last sample
    pub queue_depth: usize,
    /// Last update timestamp
    pub last_update_ts: u64,
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self {
            total_jobs_enqueued: 0,
            total_jobs_completed: 0,
            total_jobs_failed: 0,
            render_failures: 0,
            printer_failures: 0,
            avg_print_duration_ms: 0,
            success_rate: 1.0,
            queue_depth: 0,
            last_update_ts: unix_now(),
        }
    }
}

impl TelemetryMetrics {
    fn refresh_success_rate(&mut self) {
        let total = self.total_jobs_completed + self.total_jobs_failed;
        if total > 0 {
            self.success_rate = self.total_jobs_completed as f64 / total as f64;
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Telemetry collector for aggregating metrics
pub struct TelemetryCollector {
    metrics: RwLock<TelemetryMetrics>,
    /// Event history (last 1000 events)
    event_history: RwLock<VecDeque<(u64, TelemetryEvent)>>,
    /// Print duration samples (for averaging, max 1000)
    print_durations: RwLock<VecDeque<u64>>,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        info!("Initializing telemetry collector");
        Self {
            metrics: RwLock::new(TelemetryMetrics::default()),
            event_history: RwLock::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            print_durations: RwLock::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    /// Record telemetry event
    pub async fn record_event(&self, event: TelemetryEvent) {
        let timestamp = unix_now();
        let mut metrics = self.metrics.write().await;

        match &event {
            TelemetryEvent::JobEnqueued { pending_jobs, .. } => {
                metrics.total_jobs_enqueued += 1;
                metrics.queue_depth = *pending_jobs;
            }
            TelemetryEvent::PrintJobCompleted { duration_ms, .. } => {
                metrics.total_jobs_completed += 1;

                let mut durations = self.print_durations.write().await;
                if durations.len() == HISTORY_LIMIT {
                    durations.pop_front();
                }
                durations.push_back(*duration_ms);
                let sum: u64 = durations.iter().sum();
                metrics.avg_print_duration_ms = sum / durations.len() as u64;

                metrics.refresh_success_rate();
                debug!(
                    completed = metrics.total_jobs_completed,
                    avg_ms = metrics.avg_print_duration_ms,
                    "Print job completed - Success rate: {:.2}%",
                    metrics.success_rate * 100.0
                );
            }
            TelemetryEvent::PrintJobFailed { kind, .. } => {
                metrics.total_jobs_failed += 1;
                match kind.as_str() {
                    "render" => metrics.render_failures += 1,
                    "printer" => metrics.printer_failures += 1,
                    _ => {}
                }

                metrics.refresh_success_rate();
                debug!(
                    failed = metrics.total_jobs_failed,
                    kind = %kind,
                    "Print job failed - Success rate: {:.2}%",
                    metrics.success_rate * 100.0
                );
            }
        }

        metrics.last_update_ts = timestamp;
        drop(metrics);

        let mut history = self.event_history.write().await;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back((timestamp, event));
    }

    /// Get current metrics
    pub async fn get_metrics(&self) -> TelemetryMetrics {
        self.metrics.read().await.clone()
    }

    /// Most recent failures, oldest first, at most `limit`
    pub async fn recent_failures(&self, limit: usize) -> Vec<(u64, TelemetryEvent)> {
        let history = self.event_history.read().await;
        let mut failures: Vec<_> = history
            .iter()
            .rev()
            .filter(|(_, event)| matches!(event, TelemetryEvent::PrintJobFailed { .. }))
            .take(limit)
            .cloned()
            .collect();
        failures.reverse();
        failures
    }

    pub async fn update_queue_depth(&self, depth: usize) {
        self.metrics.write().await.queue_depth = depth;
    }

    /// Export metrics for external monitoring (Prometheus format)
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics().await;

        format!(
            "# HELP task_printer_jobs_enqueued_total Total number of tasks accepted into the queue\n\
             # TYPE task_printer_jobs_enqueued_total counter\n\
             task_printer_jobs_enqueued_total {}\n\
             \n\
             # HELP task_printer_jobs_completed_total Total number of completed print jobs\n\
             # TYPE task_printer_jobs_completed_total counter\n\
             task_printer_jobs_completed_total {}\n\
             \n\
             # HELP task_printer_jobs_failed_total Total number of failed print jobs by stage\n\
             # TYPE task_printer_jobs_failed_total counter\n\
             task_printer_jobs_failed_total{{stage=\"render\"}} {}\n\
             task_printer_jobs_failed_total{{stage=\"printer\"}} {}\n\
             task_printer_jobs_failed_total{{stage=\"other\"}} {}\n\
             \n\
             # HELP task_printer_avg_duration_ms Average render and print duration in milliseconds\n\
             # TYPE task_printer_avg_duration_ms gauge\n\
             task_printer_avg_duration_ms {}\n\
             \n\
             # HELP task_printer_success_rate Print job success rate (0.0 - 1.0)\n\
             # TYPE task_printer_success_rate gauge\n\
             task_printer_success_rate {:.4}\n\
             \n\
             # HELP task_printer_queue_depth Jobs waiting for the worker\n\
             # TYPE task_printer_queue_depth gauge\n\
             task_printer_queue_depth {}\n",
            metrics.total_jobs_enqueued,
            metrics.total_jobs_completed,
            metrics.render_failures,
            metrics.printer_failures,
            metrics
                .total_jobs_failed
                .saturating_sub(metrics.render_failures + metrics.printer_failures),
            metrics.avg_print_duration_ms,
            metrics.success_rate,
            metrics.queue_depth,
        )
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic telemetry reporter (one summary log line per interval)
pub struct TelemetryReporter {
    collector: Arc<TelemetryCollector>,
    queue: PrintQueue,
}

impl TelemetryReporter {
    pub fn new(collector: Arc<TelemetryCollector>, queue: PrintQueue) -> Self {
        Self { collector, queue }
    }

    /// Start periodic reporting task
    pub fn start_reporting(self, interval_secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            // First tick completes immediately
            interval.tick().await;
            let mut reported_failures = 0;

            loop {
                interval.tick().await;

                self.collector.update_queue_depth(self.queue.size()).await;
                let metrics = self.collector.get_metrics().await;

                info!(
                    "Telemetry Report - Jobs: {} enqueued, {} completed, {} failed ({} render, {} printer) | Success: {:.1}% | Avg duration: {}ms | Queue: {}",
                    metrics.total_jobs_enqueued,
                    metrics.total_jobs_completed,
                    metrics.total_jobs_failed,
                    metrics.render_failures,
                    metrics.printer_failures,
                    metrics.success_rate * 100.0,
                    metrics.avg_print_duration_ms,
                    metrics.queue_depth,
                );

                let new_failures =
                    metrics.total_jobs_failed.saturating_sub(reported_failures) as usize;
                reported_failures = metrics.total_jobs_failed;
                if new_failures == 0 {
                    continue;
                }

                let limit = new_failures.min(REPORTED_FAILURES_LIMIT);
                for (timestamp, event) in self.collector.recent_failures(limit).await {
                    if let TelemetryEvent::PrintJobFailed {
                        job_id,
                        source,
                        kind,
                        error,
                    } = event
                    {
                        warn!(
                            job_id = %job_id,
                            ?source,
                            kind = %kind,
                            at = timestamp,
                            "Dropped since last report: {}",
                            error
                        );
                    }
                }
            }
        })
    }
}
