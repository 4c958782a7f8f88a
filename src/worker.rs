use crate::errors::Result;
use crate::printer::PrinterManager;
use crate::queue::{PrintJob, QueueEntry, QueueReceiver};
use crate::render::{RenderSource, Renderer};
use crate::sentry_init;
use crate::status::WorkerState;
use crate::telemetry::{JobSource, TelemetryCollector, TelemetryEvent};
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Single consumer of the print queue.
///
/// Takes jobs strictly in arrival order, renders and prints each one, then
/// pauses for the cooldown whether the job succeeded or not. Failed jobs are
/// logged and dropped; there is no retry.
pub struct PrintWorker {
    queue: QueueReceiver,
    renderer: Arc<Renderer>,
    printer: Arc<PrinterManager>,
    telemetry: Arc<TelemetryCollector>,
    state: watch::Sender<WorkerState>,
    cooldown: Duration,
}

impl PrintWorker {
    /// Build the worker and a handle for observing its state
    pub fn new(
        queue: QueueReceiver,
        renderer: Arc<Renderer>,
        printer: Arc<PrinterManager>,
        telemetry: Arc<TelemetryCollector>,
        cooldown: Duration,
    ) -> (Self, watch::Receiver<WorkerState>) {
        let (state, state_rx) = watch::channel(WorkerState::Waiting);
        let worker = Self {
            queue,
            renderer,
            printer,
            telemetry,
            state,
            cooldown,
        };
        (worker, state_rx)
    }

    /// Run the loop on the tokio runtime until the stop sentinel is taken
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(
            printer = %self.printer.describe(),
            cooldown_secs = self.cooldown.as_secs(),
            "Print worker started"
        );

        loop {
            self.set_state(WorkerState::Waiting);

            let (job, enqueued_at) = match self.queue.get().await {
                Some(QueueEntry::Job { job, enqueued_at }) => (job, enqueued_at),
                Some(QueueEntry::Stop) => {
                    info!("Stop requested, print worker exiting");
                    break;
                }
                None => {
                    info!("All queue producers dropped, print worker exiting");
                    break;
                }
            };

            let waited_ms = (Local::now() - enqueued_at).num_milliseconds().max(0);
            debug!(job_id = %job.id, waited_ms, pending_jobs = self.queue.size(), "Job dequeued");

            let started = Instant::now();
            match self.process(&job).await {
                Ok(()) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        job_id = %job.id,
                        priority = %job.priority,
                        duration_ms,
                        "Task printed"
                    );
                    self.telemetry
                        .record_event(TelemetryEvent::PrintJobCompleted {
                            job_id: job.id.clone(),
                            source: JobSource::Queue,
                            duration_ms,
                        })
                        .await;
                }
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        priority = %job.priority,
                        kind = e.kind(),
                        "Dropping print job: {}",
                        e
                    );
                    sentry_init::capture_print_job_failure(&job.id, e.kind(), &e.to_string());
                    self.telemetry
                        .record_event(TelemetryEvent::PrintJobFailed {
                            job_id: job.id.clone(),
                            source: JobSource::Queue,
                            kind: e.kind().to_string(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }

            self.set_state(WorkerState::Cooldown);
            tokio::time::sleep(self.cooldown).await;
        }

        self.set_state(WorkerState::Stopped);
    }

    async fn process(&self, job: &PrintJob) -> Result<()> {
        self.set_state(WorkerState::Rendering);
        let bitmap = self.renderer.render(RenderSource::Job(job)).await?;

        self.set_state(WorkerState::Printing);
        self.printer.print_bitmap(&bitmap).await
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}
