use crate::errors::{DaemonError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Visual priority tag of a task. Only affects the receipt style, never the
/// dequeue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    Message,
    Info,
    /// Unrecognized tag, kept verbatim for display
    Other(String),
}

impl Priority {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "low" => Priority::Low,
            "normal" => Priority::Normal,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            "message" => Priority::Message,
            "info" => Priority::Info,
            other => Priority::Other(other.to_string()),
        }
    }

    /// Literal tag as submitted
    pub fn label(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
            Priority::Message => "message",
            Priority::Info => "info",
            Priority::Other(tag) => tag,
        }
    }
}

impl From<String> for Priority {
    fn from(tag: String) -> Self {
        Priority::parse(&tag)
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.label().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One task to print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
}

impl PrintJob {
    pub const DEFAULT_TITLE: &'static str = "Task";

    pub fn new(
        title: Option<String>,
        description: Option<String>,
        priority: Option<String>,
        due_date: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| Self::DEFAULT_TITLE.to_string()),
            description: description.unwrap_or_default(),
            priority: priority.map(Priority::from).unwrap_or_default(),
            due_date: due_date.filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueueEntry {
    Job {
        job: PrintJob,
        enqueued_at: DateTime<Local>,
    },
    /// Terminates the worker once every earlier entry has drained
    Stop,
}

/// Returned to the producer once a job sits in the queue
#[derive(Debug, Clone)]
pub struct EnqueueAck {
    pub job_id: String,
    pub enqueued_at: DateTime<Local>,
    pub pending_jobs: usize,
}

/// Producer side of the print queue. Cheap to clone; any number of request
/// handlers may hold one.
#[derive(Clone)]
pub struct PrintQueue {
    tx: mpsc::UnboundedSender<QueueEntry>,
    depth: Arc<AtomicUsize>,
}

/// Consumer side of the print queue. Not `Clone`: there is exactly one.
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<QueueEntry>,
    depth: Arc<AtomicUsize>,
}

/// Create an unbounded FIFO with a single consumer
pub fn channel() -> (PrintQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        PrintQueue {
            tx,
            depth: depth.clone(),
        },
        QueueReceiver { rx, depth },
    )
}

impl PrintQueue {
    /// Append an entry; never blocks. Returns the depth including this entry.
    pub fn put(&self, entry: QueueEntry) -> Result<usize> {
        // Count before sending so a fast consumer can never underflow the depth
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(entry).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(DaemonError::Queue("print worker is not running".to_string()));
        }
        Ok(depth)
    }

    /// Enqueue a job stamped with the current local time
    pub fn enqueue(&self, job: PrintJob) -> Result<EnqueueAck> {
        let job_id = job.id.clone();
        let enqueued_at = Local::now();
        let pending_jobs = self.put(QueueEntry::Job { job, enqueued_at })?;

        debug!(job_id = %job_id, pending_jobs, "Job enqueued");

        Ok(EnqueueAck {
            job_id,
            enqueued_at,
            pending_jobs,
        })
    }

    /// Push the stop sentinel to the back of the queue
    pub fn stop(&self) -> Result<()> {
        self.put(QueueEntry::Stop).map(|_| ())
    }

    /// Entries not yet dequeued. Advisory under concurrent producers.
    pub fn size(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl QueueReceiver {
    /// Wait for the next entry in arrival order. `None` once every producer
    /// handle has been dropped and the queue is empty.
    pub async fn get(&mut self) -> Option<QueueEntry> {
        let entry = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(entry)
    }

    pub fn size(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}
