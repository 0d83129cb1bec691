//! # btc_range_finder
//!
//! Parallel Bitcoin private-key range scanner.
//!
//! ## Architecture
//!
//! - `crypto`: Base58Check, the secp256k1 provider and key -> address derivation
//! - `matcher`: The immutable target address set
//! - `worker`: Range partitioning, CPU workers and the search coordinator
//! - `sink`: Match log / checkpoint persistence and progress reporting
//! - `config`: Runtime configuration

pub mod config;
pub mod crypto;
pub mod matcher;
pub mod sink;
pub mod worker;

pub use config::Config;
pub use crypto::{CryptoProvider, DerivedIdentity, Secp256k1Provider};
pub use matcher::TargetSet;
pub use sink::{FileSink, PersistenceSink, ProgressSink};
pub use worker::{Coordinator, KeyRange, Match, RunStatus, SearchConfig, SearchError, SearchStats};
