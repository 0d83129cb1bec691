//! Search coordinator: spawns the workers, drains their events and owns the
//! run-wide statistics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::crypto::CryptoProvider;
use crate::matcher::TargetSet;
use crate::sink::{PersistenceSink, ProgressSink};

use super::cpu::{CancelToken, CpuWorker, DEFAULT_PROGRESS_BATCH};
use super::message::{Command, Match, WorkerEvent};
use super::range::KeyRange;

/// How often the event loop wakes up to look at the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Queued events allowed per worker before senders block.
const EVENTS_PER_WORKER: usize = 64;

/// Default time workers get to acknowledge a stop.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub workers: usize,
    /// Candidates between progress samples, per worker
    pub progress_batch: u64,
    /// How long to wait for workers after a stop before detaching them
    pub grace_period: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            progress_batch: DEFAULT_PROGRESS_BATCH,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every worker exhausted its slice.
    Completed,
    /// A stop was requested; results are partial.
    Stopped,
}

/// Coordinator-side view of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Done,
    Failed,
}

impl WorkerState {
    fn is_finished(self) -> bool {
        matches!(self, WorkerState::Done | WorkerState::Failed)
    }
}

/// Aggregate results of a run.
#[derive(Debug, Clone)]
pub struct SearchStats {
    pub total_keys_checked: u64,
    pub total_keys_found: u64,
    pub total_matches: Vec<Match>,
    pub start_time: Instant,
    pub elapsed: Duration,
    pub status: RunStatus,
    /// Workers abandoned after the grace period expired
    pub detached_workers: usize,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            total_keys_checked: 0,
            total_keys_found: 0,
            total_matches: Vec::new(),
            start_time: Instant::now(),
            elapsed: Duration::ZERO,
            status: RunStatus::Completed,
            detached_workers: 0,
        }
    }

    /// Average throughput over the whole run.
    pub fn keys_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_keys_checked as f64 / secs
        } else {
            0.0
        }
    }
}

/// Errors that end a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker {worker} failed: {reason}")]
    WorkerFailed {
        worker: usize,
        reason: String,
        /// Everything gathered before the failure, matches included
        stats: Box<SearchStats>,
    },
}

/// Requests a cooperative stop from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle(CancelToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Partitions a key range across CPU workers and aggregates their events.
pub struct Coordinator<P: ?Sized> {
    config: SearchConfig,
    provider: Arc<P>,
    /// External stop request, observed by the event loop
    stop: CancelToken,
}

/// Per-run bookkeeping owned by the event loop.
struct Run<'a> {
    range: KeyRange,
    stride: usize,
    commands: Vec<Sender<Command>>,
    states: Vec<WorkerState>,
    worker_keys: Vec<u64>,
    cancel: CancelToken,
    deadline: Option<Instant>,
    failure: Option<(usize, String)>,
    stats: SearchStats,
    persistence: &'a mut dyn PersistenceSink,
    progress: &'a mut dyn ProgressSink,
}

impl<P: CryptoProvider + ?Sized + 'static> Coordinator<P> {
    pub fn new(config: SearchConfig, provider: Arc<P>) -> Result<Self, SearchError> {
        if config.workers == 0 {
            return Err(SearchError::NoWorkers);
        }
        Ok(Self {
            config,
            provider,
            stop: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Handle that can stop a running search, e.g. from a signal handler.
    ///
    /// Once stopped, the coordinator stays stopped: later searches end
    /// immediately with [`RunStatus::Stopped`].
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Same as `stop_handle().stop()`.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Scans `range` for addresses in `targets`, blocking until every worker
    /// completes, the run is stopped, or a worker fails.
    ///
    /// On failure all remaining workers are stopped before the error is
    /// returned; matches seen up to then are in the error's stats and have
    /// been handed to `persistence`.
    pub fn search(
        &self,
        range: KeyRange,
        targets: Arc<TargetSet>,
        persistence: &mut dyn PersistenceSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<SearchStats, SearchError> {
        let workers = self.config.workers;
        log::info!(
            target: "search",
            "Searching {} with {} workers against {} targets",
            range,
            workers,
            targets.len()
        );

        let (event_tx, event_rx) = bounded(workers * EVENTS_PER_WORKER);
        let cancel = CancelToken::new();
        let mut commands = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (command_tx, command_rx) = unbounded();
            let worker = CpuWorker::new(
                index,
                self.provider.clone(),
                targets.clone(),
                command_rx,
                event_tx.clone(),
                cancel.clone(),
            )
            .with_progress_batch(self.config.progress_batch);

            match spawn_worker(index, worker, event_tx.clone()) {
                Ok(handle) => {
                    commands.push(command_tx);
                    handles.push(Some(handle));
                }
                Err(e) => {
                    cancel.cancel();
                    for tx in &commands {
                        let _ = tx.send(Command::Stop);
                    }
                    drop(commands);
                    for handle in handles.into_iter().flatten() {
                        let _ = handle.join();
                    }
                    return Err(SearchError::Spawn(e));
                }
            }
        }
        drop(event_tx);

        let mut run = Run {
            range,
            stride: workers,
            commands,
            states: vec![WorkerState::Idle; workers],
            worker_keys: vec![0; workers],
            cancel,
            deadline: None,
            failure: None,
            stats: SearchStats::new(),
            persistence,
            progress,
        };

        self.event_loop(&mut run, &event_rx);

        for (index, handle) in handles.iter_mut().enumerate() {
            if run.states[index].is_finished() {
                if let Some(handle) = handle.take() {
                    let _ = handle.join();
                }
            }
        }

        let mut stats = run.stats;
        stats.total_keys_checked = run.worker_keys.iter().sum();
        stats.elapsed = stats.start_time.elapsed();

        log::info!(
            target: "search",
            "Search finished ({:?}): {} keys, {} matches in {:.2}s",
            stats.status,
            stats.total_keys_checked,
            stats.total_matches.len(),
            stats.elapsed.as_secs_f64()
        );

        match run.failure {
            Some((worker, reason)) => Err(SearchError::WorkerFailed {
                worker,
                reason,
                stats: Box::new(stats),
            }),
            None => Ok(stats),
        }
    }

    fn event_loop(&self, run: &mut Run<'_>, events: &Receiver<WorkerEvent>) {
        while run.states.iter().any(|s| !s.is_finished()) {
            if run.deadline.is_none() && self.stop.is_cancelled() {
                log::info!(target: "search", "Stop requested");
                run.stats.status = RunStatus::Stopped;
                run.begin_stop(self.config.grace_period);
            }

            let wait = match run.deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };

            match events.recv_timeout(wait) {
                Ok(event) => run.handle(event, self.config.grace_period),
                Err(RecvTimeoutError::Timeout) => {
                    if run.deadline.is_some_and(|d| Instant::now() >= d) {
                        // Keep whatever the stragglers managed to send.
                        for event in events.try_iter() {
                            run.handle(event, self.config.grace_period);
                        }
                        run.detach_stragglers();
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Every worker thread is gone; the unfinished ones died
                    // without reporting.
                    for (index, state) in run.states.iter_mut().enumerate() {
                        if !state.is_finished() {
                            *state = WorkerState::Failed;
                            run.failure
                                .get_or_insert((index, "exited without completing".into()));
                        }
                    }
                    break;
                }
            }
        }
    }
}

impl Run<'_> {
    fn handle(&mut self, event: WorkerEvent, grace_period: Duration) {
        match event {
            WorkerEvent::Ready { worker_index } => {
                let command = if self.deadline.is_some() {
                    Command::Stop
                } else {
                    self.states[worker_index] = WorkerState::Running;
                    Command::Start {
                        min: self.range.min(),
                        max: self.range.max(),
                        stride: self.stride,
                    }
                };
                log::debug!(target: "search", "Worker {} ready, sending {:?}", worker_index, command);
                let _ = self.commands[worker_index].send(command);
            }
            WorkerEvent::Progress(sample) => {
                self.worker_keys[sample.worker_index] = sample.keys_checked;
                let total = self.worker_keys.iter().sum();

                if let Err(e) = self.persistence.write_checkpoint(&sample.last_candidate_hex) {
                    log::warn!(target: "search", "Failed to update checkpoint: {}", e);
                }
                self.progress.on_progress(&sample, total);
            }
            WorkerEvent::Match { matches, .. } => {
                for found in matches {
                    log::info!(
                        target: "search",
                        "Match: {} (key {})",
                        found.address,
                        found.candidate_hex
                    );
                    if let Err(e) = self.persistence.record_match(&found) {
                        log::warn!(target: "search", "Failed to persist match {}: {}", found.address, e);
                    }
                    self.stats.total_matches.push(found);
                }
            }
            WorkerEvent::Complete {
                worker_index,
                keys_checked,
                keys_found,
            } => {
                self.worker_keys[worker_index] = keys_checked;
                self.stats.total_keys_found += keys_found;
                self.states[worker_index] = WorkerState::Done;
                log::debug!(target: "search", "Worker {} complete", worker_index);
            }
            WorkerEvent::Failed {
                worker_index,
                reason,
            } => {
                log::error!(target: "search", "Worker {} failed: {}", worker_index, reason);
                self.states[worker_index] = WorkerState::Failed;
                if self.failure.is_none() {
                    self.failure = Some((worker_index, reason));
                }
                if self.deadline.is_none() {
                    self.begin_stop(grace_period);
                }
            }
        }
    }

    /// Raises the cancel flag, tells every worker to stop and starts the
    /// grace period.
    fn begin_stop(&mut self, grace_period: Duration) {
        self.cancel.cancel();
        for (tx, state) in self.commands.iter().zip(self.states.iter_mut()) {
            let _ = tx.send(Command::Stop);
            if *state == WorkerState::Running {
                *state = WorkerState::Stopping;
            }
        }
        self.deadline = Some(Instant::now() + grace_period);
        log::debug!(target: "search", "Stop broadcast to {} workers", self.commands.len());
    }

    fn detach_stragglers(&mut self) {
        let stragglers: Vec<usize> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_finished())
            .map(|(i, _)| i)
            .collect();

        if !stragglers.is_empty() {
            log::warn!(
                target: "search",
                "Detaching workers {:?} after the stop grace period",
                stragglers
            );
        }
        self.stats.detached_workers = stragglers.len();
    }
}

fn spawn_worker<P: CryptoProvider + ?Sized + 'static>(
    index: usize,
    worker: CpuWorker<P>,
    events: Sender<WorkerEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("search-worker-{}", index))
        .spawn(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                let _ = events.send(WorkerEvent::Failed {
                    worker_index: index,
                    reason: panic_message(payload.as_ref()),
                });
            }
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".into()
    }
}
