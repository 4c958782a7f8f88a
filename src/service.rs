use crate::config::AppConfig;
use crate::errors::{DaemonError, Result};
use crate::printer::PrinterManager;
use crate::queue::{self, EnqueueAck, PrintJob, PrintQueue};
use crate::render::{RenderSource, Renderer};
use crate::sentry_init;
use crate::status::WorkerState;
use crate::telemetry::{JobSource, TelemetryCollector, TelemetryEvent};
use crate::worker::PrintWorker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Job id reported for synchronous raw prints
pub const RAW_JOB_ID: &str = "raw";

/// Everything the HTTP layer needs: the queue producer, the shared renderer
/// and printer, and the worker's lifecycle.
///
/// Built once at startup and shared behind an `Arc`.
pub struct PrintService {
    queue: PrintQueue,
    renderer: Arc<Renderer>,
    printer: Arc<PrinterManager>,
    telemetry: Arc<TelemetryCollector>,
    worker_state: watch::Receiver<WorkerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started_at: Instant,
}

impl PrintService {
    /// Create the queue and spawn its worker
    pub fn start(
        renderer: Arc<Renderer>,
        printer: Arc<PrinterManager>,
        telemetry: Arc<TelemetryCollector>,
        cooldown: Duration,
    ) -> Self {
        let (queue, receiver) = queue::channel();
        let (worker, worker_state) = PrintWorker::new(
            receiver,
            renderer.clone(),
            printer.clone(),
            telemetry.clone(),
            cooldown,
        );
        let handle = worker.spawn();

        Self {
            queue,
            renderer,
            printer,
            telemetry,
            worker_state,
            worker: Mutex::new(Some(handle)),
            started_at: Instant::now(),
        }
    }

    pub fn from_config(config: &AppConfig, telemetry: Arc<TelemetryCollector>) -> Self {
        let renderer = Arc::new(Renderer::from_config(config));
        let printer = Arc::new(PrinterManager::from_config(config));
        Self::start(renderer, printer, telemetry, config.cooldown())
    }

    /// Hand a job to the worker; returns as soon as it is queued
    pub async fn enqueue(&self, job: PrintJob) -> Result<EnqueueAck> {
        let priority = job.priority.clone();
        let ack = self.queue.enqueue(job)?;

        info!(
            job_id = %ack.job_id,
            priority = %priority,
            pending_jobs = ack.pending_jobs,
            "Task queued for printing"
        );
        self.telemetry
            .record_event(TelemetryEvent::JobEnqueued {
                job_id: ack.job_id.clone(),
                pending_jobs: ack.pending_jobs,
            })
            .await;

        Ok(ack)
    }

    /// Render and print caller-supplied HTML right away, bypassing the queue.
    ///
    /// Shares the printer lock with the worker, so this waits for any receipt
    /// currently being written. Failures are returned to the caller.
    pub async fn print_raw(&self, html: &str) -> Result<()> {
        let started = Instant::now();
        let result = async {
            let bitmap = self.renderer.render(RenderSource::Raw(html)).await?;
            self.printer.print_bitmap(&bitmap).await
        }
        .await;

        match &result {
            Ok(()) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(html_len = html.len(), duration_ms, "Raw HTML printed");
                self.telemetry
                    .record_event(TelemetryEvent::PrintJobCompleted {
                        job_id: RAW_JOB_ID.to_string(),
                        source: JobSource::Raw,
                        duration_ms,
                    })
                    .await;
            }
            Err(e) => {
                error!(kind = e.kind(), "Raw print failed: {}", e);
                sentry_init::capture_print_job_failure(RAW_JOB_ID, e.kind(), &e.to_string());
                self.telemetry
                    .record_event(TelemetryEvent::PrintJobFailed {
                        job_id: RAW_JOB_ID.to_string(),
                        source: JobSource::Raw,
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.size()
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.worker_state.borrow()
    }

    /// Subscribe to worker state changes
    pub fn watch_worker(&self) -> watch::Receiver<WorkerState> {
        self.worker_state.clone()
    }

    pub fn queue(&self) -> &PrintQueue {
        &self.queue
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Push the stop sentinel and wait for the worker to drain everything
    /// queued before it. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(handle) = self.worker.lock().await.take() else {
            return Ok(());
        };

        let pending = self.queue.size();
        if pending > 0 {
            warn!(pending_jobs = pending, "Draining queue before shutdown");
        }

        if let Err(e) = self.queue.stop() {
            // Worker already gone; still reap the task below
            warn!("Could not queue stop request: {}", e);
        }
        handle
            .await
            .map_err(|e| DaemonError::Queue(format!("Print worker panicked: {}", e)))?;

        info!("Print worker stopped");
        Ok(())
    }
}
