//! Typed messages exchanged between the coordinator and its workers.

use std::fmt;

use primitive_types::U256;

/// A candidate whose address is in the target set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The private key (64 hex digits, no 0x prefix)
    pub candidate_hex: String,
    /// The compressed P2PKH address
    pub address: String,
    /// The private key as compressed WIF
    pub secret_export: String,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Private key: {}, WIF: {}, Address: {}",
            self.candidate_hex, self.secret_export, self.address
        )
    }
}

/// Periodic throughput report from one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    pub worker_index: usize,
    /// Keys checked by this worker since it started
    pub keys_checked: u64,
    /// Keys per second over the last sampling window
    pub rate: f64,
    pub last_candidate_hex: String,
}

/// Coordinator -> worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin scanning `[min, max)` with the given stride.
    Start { min: U256, max: U256, stride: usize },
    /// Stop as soon as possible.
    Stop,
}

/// Worker -> coordinator.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Ready {
        worker_index: usize,
    },
    Progress(ProgressSample),
    Match {
        worker_index: usize,
        matches: Vec<Match>,
    },
    Complete {
        worker_index: usize,
        keys_checked: u64,
        keys_found: u64,
    },
    /// The worker's thread died without completing.
    Failed {
        worker_index: usize,
        reason: String,
    },
}

impl WorkerEvent {
    /// Index of the worker that sent this event.
    pub fn worker_index(&self) -> usize {
        match self {
            WorkerEvent::Ready { worker_index }
            | WorkerEvent::Match { worker_index, .. }
            | WorkerEvent::Complete { worker_index, .. }
            | WorkerEvent::Failed { worker_index, .. } => *worker_index,
            WorkerEvent::Progress(sample) => sample.worker_index,
        }
    }
}
