//! End-to-end searches over small ranges with known keys.
//!
//! The addresses of the first few private keys are well known, which lets
//! these tests check the whole pipeline from partitioning to persistence.

use std::sync::Arc;
use std::time::Duration;

use btc_range_finder::crypto::{derive_address, derive_secret_export};
use btc_range_finder::sink::{LogProgress, MemorySink};
use btc_range_finder::worker::range::candidate_hex;
use btc_range_finder::worker::ProgressSample;
use btc_range_finder::{
    Coordinator, KeyRange, ProgressSink, RunStatus, SearchConfig, Secp256k1Provider, TargetSet,
};
use primitive_types::U256;

/// Known compressed P2PKH addresses / WIFs.
struct KeyVector {
    key: u64,
    address: &'static str,
    wif: &'static str,
}

const VECTORS: &[KeyVector] = &[KeyVector {
    key: 1,
    address: "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
    wif: "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
}];

fn address_of(key: u64) -> String {
    derive_address(&Secp256k1Provider::new(), &candidate_hex(U256::from(key))).unwrap()
}

fn coordinator(workers: usize) -> Coordinator<Secp256k1Provider> {
    Coordinator::new(
        SearchConfig {
            workers,
            progress_batch: 1000,
            grace_period: Duration::from_secs(2),
        },
        Arc::new(Secp256k1Provider::new()),
    )
    .unwrap()
}

fn range(min: u64, max: u64) -> KeyRange {
    KeyRange::new(U256::from(min), U256::from(max)).unwrap()
}

#[test]
fn test_known_vectors() {
    let provider = Secp256k1Provider::new();
    for v in VECTORS {
        let hex = candidate_hex(U256::from(v.key));
        assert_eq!(derive_address(&provider, &hex).as_deref(), Some(v.address));
        assert_eq!(derive_secret_export(&provider, &hex).as_deref(), Some(v.wif));
    }
}

#[test]
fn test_two_workers_find_key_three() {
    let targets = Arc::new(TargetSet::new([address_of(3)]));
    let mut sink = MemorySink::default();

    let stats = coordinator(2)
        .search(range(1, 5), targets, &mut sink, &mut LogProgress)
        .unwrap();

    assert_eq!(stats.status, RunStatus::Completed);
    assert_eq!(stats.total_keys_checked, 4);
    assert_eq!(stats.total_matches.len(), 1);
    assert_eq!(stats.total_keys_found, 1);

    let found = &stats.total_matches[0];
    assert_eq!(found.candidate_hex, candidate_hex(U256::from(3)));
    assert_eq!(found.address, address_of(3));
    assert_eq!(sink.matches.len(), 1);
    // No progress sample at this size, so no checkpoint either.
    assert_eq!(sink.checkpoint, None);
}

#[test]
fn test_match_found_regardless_of_worker_count() {
    let targets = Arc::new(TargetSet::new([address_of(1), address_of(40)]));

    for workers in [1, 3, 8, 64] {
        let mut sink = MemorySink::default();
        let stats = coordinator(workers)
            .search(range(1, 50), targets.clone(), &mut sink, &mut LogProgress)
            .unwrap();

        assert_eq!(stats.total_keys_checked, 49, "workers = {}", workers);
        let mut keys: Vec<String> = stats
            .total_matches
            .iter()
            .map(|m| m.candidate_hex.clone())
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![candidate_hex(U256::from(1)), candidate_hex(U256::from(40))]
        );
    }
}

/// Records the last sample seen per worker and stops the run after the first.
struct StopAfterFirst {
    handle: btc_range_finder::worker::StopHandle,
    samples: Vec<ProgressSample>,
}

impl ProgressSink for StopAfterFirst {
    fn on_progress(&mut self, sample: &ProgressSample, _total: u64) {
        self.samples.push(sample.clone());
        self.handle.stop();
    }
}

#[test]
fn test_stop_from_progress_sink() {
    let coordinator = Coordinator::new(
        SearchConfig {
            workers: 2,
            progress_batch: 50,
            grace_period: Duration::from_secs(5),
        },
        Arc::new(Secp256k1Provider::new()),
    )
    .unwrap();
    let mut progress = StopAfterFirst {
        handle: coordinator.stop_handle(),
        samples: Vec::new(),
    };
    let mut sink = MemorySink::default();

    let stats = coordinator
        .search(
            range(1, 1 << 40),
            Arc::new(TargetSet::default()),
            &mut sink,
            &mut progress,
        )
        .unwrap();

    assert_eq!(stats.status, RunStatus::Stopped);
    assert_eq!(stats.detached_workers, 0);
    assert!(!progress.samples.is_empty());
    assert!(stats.total_keys_checked >= 50);
    assert!(stats.total_keys_checked < 1 << 40);
    assert!(sink.checkpoint.is_some());
}
