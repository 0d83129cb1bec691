//! Parallel keyspace search.
//!
//! This module provides:
//! - Static partitioning of a key range into strided worker slices
//! - The typed coordinator <-> worker protocol
//! - CPU workers and the coordinator that drives them

mod cpu;
mod message;
mod pool;
pub mod range;

pub use cpu::{CancelToken, CpuWorker, DEFAULT_PROGRESS_BATCH};
pub use message::{Command, Match, ProgressSample, WorkerEvent};
pub use pool::{
    Coordinator, RunStatus, SearchConfig, SearchError, SearchStats, StopHandle, WorkerState,
    DEFAULT_GRACE_PERIOD,
};
pub use range::{KeyRange, RangeError, WorkerAssignment};
