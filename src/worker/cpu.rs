//! CPU worker that scans one arithmetic slice of the keyspace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::crypto::{derive_address, derive_secret_export, CryptoProvider};
use crate::matcher::TargetSet;

use super::message::{Command, Match, ProgressSample, WorkerEvent};
use super::range::{candidate_hex, KeyRange, WorkerAssignment};

/// Candidates between two progress samples.
pub const DEFAULT_PROGRESS_BATCH: u64 = 1000;

/// Cooperative cancellation flag shared by a coordinator and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A CPU worker that derives and tests candidate keys.
pub struct CpuWorker<P: ?Sized> {
    /// Worker index, also the offset of its first candidate
    index: usize,
    provider: Arc<P>,
    targets: Arc<TargetSet>,
    commands: Receiver<Command>,
    events: Sender<WorkerEvent>,
    cancel: CancelToken,
    progress_batch: u64,
}

impl<P: CryptoProvider + ?Sized> CpuWorker<P> {
    pub fn new(
        index: usize,
        provider: Arc<P>,
        targets: Arc<TargetSet>,
        commands: Receiver<Command>,
        events: Sender<WorkerEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            index,
            provider,
            targets,
            commands,
            events,
            cancel,
            progress_batch: DEFAULT_PROGRESS_BATCH,
        }
    }

    /// Sets how many candidates are checked between progress samples.
    pub fn with_progress_batch(mut self, batch: u64) -> Self {
        self.progress_batch = batch.max(1);
        self
    }

    /// Runs the worker to completion.
    ///
    /// Announces `Ready`, waits for `Start` (or `Stop`), scans its slice and
    /// always finishes with `Complete` unless the coordinator has gone away.
    pub fn run(&self) {
        self.emit(WorkerEvent::Ready {
            worker_index: self.index,
        });

        let (keys_checked, keys_found) = match self.commands.recv() {
            Ok(Command::Start { min, max, stride }) => match KeyRange::new(min, max) {
                Ok(range) if stride > self.index => self.search(&range, stride),
                _ => {
                    log::warn!(target: "worker", "Worker {} got an unusable start command", self.index);
                    (0, 0)
                }
            },
            Ok(Command::Stop) => (0, 0),
            Err(_) => return,
        };

        log::debug!(
            target: "worker",
            "Worker {} done: {} keys checked, {} found",
            self.index,
            keys_checked,
            keys_found
        );

        self.emit(WorkerEvent::Complete {
            worker_index: self.index,
            keys_checked,
            keys_found,
        });
    }

    /// Scans `range` with the given stride, returning (checked, found).
    fn search(&self, range: &KeyRange, stride: usize) -> (u64, u64) {
        let assignment = WorkerAssignment::new(self.index, stride);
        let mut keys_checked = 0u64;
        let mut keys_found = 0u64;

        let mut window_start = Instant::now();
        let mut window_base = 0u64;

        for key in assignment.candidates(range) {
            if self.cancel.is_cancelled() {
                log::debug!(target: "worker", "Worker {} observed stop", self.index);
                break;
            }

            let hex = candidate_hex(key);

            if let Some(address) = derive_address(&*self.provider, &hex) {
                if self.targets.contains(&address) {
                    keys_found += 1;
                    // The key already produced an address, so the export cannot fail.
                    let secret_export =
                        derive_secret_export(&*self.provider, &hex).unwrap_or_default();

                    self.emit(WorkerEvent::Match {
                        worker_index: self.index,
                        matches: vec![Match {
                            candidate_hex: hex.clone(),
                            address,
                            secret_export,
                        }],
                    });
                }
            }

            keys_checked += 1;

            if keys_checked % self.progress_batch == 0 {
                let elapsed = window_start.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    (keys_checked - window_base) as f64 / elapsed
                } else {
                    0.0
                };

                self.emit(WorkerEvent::Progress(ProgressSample {
                    worker_index: self.index,
                    keys_checked,
                    rate,
                    last_candidate_hex: hex,
                }));

                window_start = Instant::now();
                window_base = keys_checked;
            }
        }

        (keys_checked, keys_found)
    }

    fn emit(&self, event: WorkerEvent) {
        // The coordinator may already have detached us; nothing to do then.
        let _ = self.events.send(event);
    }

    /// Returns the worker index.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_address, Secp256k1Provider};
    use crossbeam_channel::unbounded;
    use primitive_types::U256;

    fn address_of(key: u64) -> String {
        let provider = Secp256k1Provider::new();
        derive_address(&provider, &candidate_hex(U256::from(key))).unwrap()
    }

    fn spawn_worker(
        index: usize,
        targets: TargetSet,
        cancel: CancelToken,
        batch: u64,
    ) -> (Sender<Command>, Receiver<WorkerEvent>, std::thread::JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = unbounded();
        let (evt_tx, evt_rx) = unbounded();
        let worker = CpuWorker::new(
            index,
            Arc::new(Secp256k1Provider::new()),
            Arc::new(targets),
            cmd_rx,
            evt_tx,
            cancel,
        )
        .with_progress_batch(batch);
        let handle = std::thread::spawn(move || worker.run());
        (cmd_tx, evt_rx, handle)
    }

    #[test]
    fn test_worker_reports_match_and_completes() {
        let targets = TargetSet::new([address_of(3)]);
        let (cmd_tx, evt_rx, handle) = spawn_worker(0, targets, CancelToken::new(), 1000);

        cmd_tx
            .send(Command::Start {
                min: U256::from(1),
                max: U256::from(5),
                stride: 2,
            })
            .unwrap();
        handle.join().unwrap();

        let events: Vec<WorkerEvent> = evt_rx.try_iter().collect();
        assert!(matches!(events[0], WorkerEvent::Ready { worker_index: 0 }));
        match &events[1] {
            WorkerEvent::Match { matches, .. } => {
                assert_eq!(matches.len(), 1);
                assert!(matches[0].candidate_hex.ends_with("03"));
            }
            other => panic!("expected match, got {:?}", other),
        }
        assert!(matches!(
            events[2],
            WorkerEvent::Complete {
                worker_index: 0,
                keys_checked: 2,
                keys_found: 1
            }
        ));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_progress_every_batch() {
        let (cmd_tx, evt_rx, handle) = spawn_worker(1, TargetSet::default(), CancelToken::new(), 4);

        cmd_tx
            .send(Command::Start {
                min: U256::from(1),
                max: U256::from(21),
                stride: 2,
            })
            .unwrap();
        handle.join().unwrap();

        let samples: Vec<ProgressSample> = evt_rx
            .try_iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress(s) => Some(s),
                _ => None,
            })
            .collect();

        // Worker 1 checks 2, 4, .., 20: ten keys, samples after 4 and 8.
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].keys_checked, 4);
        assert_eq!(samples[1].keys_checked, 8);
        assert_eq!(
            samples[1].last_candidate_hex,
            candidate_hex(U256::from(16))
        );
        assert!(samples.iter().all(|s| s.rate >= 0.0));
    }

    #[test]
    fn test_cancelled_worker_checks_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let targets = TargetSet::new([address_of(1)]);
        let (cmd_tx, evt_rx, handle) = spawn_worker(0, targets, cancel, 1);

        cmd_tx
            .send(Command::Start {
                min: U256::from(1),
                max: U256::from(1000),
                stride: 1,
            })
            .unwrap();
        handle.join().unwrap();

        let events: Vec<WorkerEvent> = evt_rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            WorkerEvent::Complete {
                keys_checked: 0,
                keys_found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_before_start() {
        let (cmd_tx, evt_rx, handle) =
            spawn_worker(2, TargetSet::default(), CancelToken::new(), 1000);
        cmd_tx.send(Command::Stop).unwrap();
        handle.join().unwrap();

        let events: Vec<WorkerEvent> = evt_rx.try_iter().collect();
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Complete {
                worker_index: 2,
                keys_checked: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_keys_are_skipped() {
        // Key 0 is not a valid secret key; it still counts as checked.
        let (cmd_tx, evt_rx, handle) =
            spawn_worker(0, TargetSet::default(), CancelToken::new(), 1000);
        cmd_tx
            .send(Command::Start {
                min: U256::zero(),
                max: U256::from(3),
                stride: 1,
            })
            .unwrap();
        handle.join().unwrap();

        let last = evt_rx.try_iter().last();
        assert!(matches!(
            last,
            Some(WorkerEvent::Complete { keys_checked: 3, keys_found: 0, .. })
        ));
    }
}
