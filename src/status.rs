//! Print worker lifecycle, reported by `GET /queue` and in log lines.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Blocked on the queue
    Waiting,
    Rendering,
    Printing,
    /// Fixed pause after every job, success or failure
    Cooldown,
    /// Stop sentinel consumed; no further jobs will be taken
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Waiting => "waiting",
            WorkerState::Rendering => "rendering",
            WorkerState::Printing => "printing",
            WorkerState::Cooldown => "cooldown",
            WorkerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
