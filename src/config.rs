//! Runtime configuration for the range scanner.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::matcher::{TargetError, TargetSet};
use crate::worker::range::parse_key;
use crate::worker::{KeyRange, RangeError, SearchConfig};

/// Bitcoin private-key range scanner
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Lower bound of the range, inclusive (decimal or 0x-prefixed hex)
    #[arg(long, requires = "max", conflicts_with = "puzzle")]
    pub min: Option<String>,

    /// Upper bound of the range, exclusive (decimal or 0x-prefixed hex)
    #[arg(long, requires = "min")]
    pub max: Option<String>,

    /// Scan the range of puzzle N: [2^(N-1), 2^N)
    #[arg(short = 'p', long)]
    pub puzzle: Option<u32>,

    /// Target address (repeatable)
    #[arg(short = 'a', long = "address")]
    pub addresses: Vec<String>,

    /// File with one target address per line
    #[arg(short = 'f', long)]
    pub targets: Option<PathBuf>,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// File that matches are appended to
    #[arg(short = 'o', long, default_value = "keys.txt")]
    pub output: PathBuf,

    /// File holding the last key tried
    #[arg(long, default_value = "last_key.txt")]
    pub checkpoint: PathBuf,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "5")]
    pub report_interval: u64,

    /// Keys each worker checks between progress samples
    #[arg(long, default_value = "1000")]
    pub progress_batch: u64,

    /// Milliseconds to wait for workers after Ctrl+C
    #[arg(long, default_value = "2000")]
    pub grace_ms: u64,
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Validates everything that does not need the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.key_range()?;

        if self.worker_count() == 0 {
            return Err(ConfigError::NoWorkers);
        }

        if self.progress_batch == 0 {
            return Err(ConfigError::ZeroProgressBatch);
        }

        if self.addresses.is_empty() && self.targets.is_none() {
            return Err(ConfigError::NoTargets);
        }

        Ok(())
    }

    /// Resolves the requested range from `--puzzle` or `--min/--max`.
    pub fn key_range(&self) -> Result<KeyRange, ConfigError> {
        match (&self.puzzle, &self.min, &self.max) {
            (Some(n), None, None) => Ok(KeyRange::puzzle(*n)?),
            (None, Some(min), Some(max)) => {
                let lo = parse_key(min).ok_or_else(|| ConfigError::BadBound(min.clone()))?;
                let hi = parse_key(max).ok_or_else(|| ConfigError::BadBound(max.clone()))?;
                Ok(KeyRange::new(lo, hi)?)
            }
            _ => Err(ConfigError::RangeRequired),
        }
    }

    /// Loads the target file (if any) and merges in `--address` values.
    pub fn load_targets(&self) -> Result<TargetSet, ConfigError> {
        let from_args = TargetSet::parse(&self.addresses.join("\n"))?;
        let targets = match &self.targets {
            Some(path) => TargetSet::from_file(path)?.union(&from_args),
            None => from_args,
        };

        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(targets)
    }

    /// Engine settings derived from the command line.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            workers: self.worker_count(),
            progress_batch: self.progress_batch,
            grace_period: Duration::from_millis(self.grace_ms),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Specify either --puzzle or both --min and --max")]
    RangeRequired,

    #[error("Invalid range bound: {0:?}")]
    BadBound(String),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Progress batch must be at least 1")]
    ZeroProgressBatch,

    #[error("No target addresses given (use --address or --targets)")]
    NoTargets,

    #[error(transparent)]
    Targets(#[from] TargetError),
}
