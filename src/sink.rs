//! Where matches and progress go once the coordinator has them.
//!
//! The coordinator only knows the two capability traits; the file-backed and
//! logging implementations here are what the binary wires in.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::worker::{Match, ProgressSample};

/// Durable storage for matches and the informational checkpoint.
pub trait PersistenceSink {
    /// Appends one match record. Must never reorder or truncate earlier ones.
    fn record_match(&mut self, found: &Match) -> io::Result<()>;

    /// Overwrites the checkpoint with the last candidate attempted.
    fn write_checkpoint(&mut self, candidate_hex: &str) -> io::Result<()>;
}

/// Receiver of periodic progress samples.
pub trait ProgressSink {
    /// Called for every sample; `total_keys_checked` is the run-wide aggregate
    /// after the sample was applied.
    fn on_progress(&mut self, sample: &ProgressSample, total_keys_checked: u64);
}

/// Match log plus checkpoint file.
///
/// Match lines look like
/// `Private key: <hex>, WIF: <wif>, Address: <address>`.
#[derive(Debug, Clone)]
pub struct FileSink {
    match_log: PathBuf,
    checkpoint: PathBuf,
}

impl FileSink {
    pub fn new(match_log: impl Into<PathBuf>, checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            match_log: match_log.into(),
            checkpoint: checkpoint.into(),
        }
    }

    pub fn match_log(&self) -> &Path {
        &self.match_log
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }
}

impl PersistenceSink for FileSink {
    fn record_match(&mut self, found: &Match) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.match_log)?;
        writeln!(file, "{}", found)?;
        file.sync_data()
    }

    fn write_checkpoint(&mut self, candidate_hex: &str) -> io::Result<()> {
        let mut file = File::create(&self.checkpoint)?;
        write!(file, "Last key tried: {}", candidate_hex)
    }
}

/// In-memory sink, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub matches: Vec<Match>,
    pub checkpoint: Option<String>,
}

impl PersistenceSink for MemorySink {
    fn record_match(&mut self, found: &Match) -> io::Result<()> {
        self.matches.push(found.clone());
        Ok(())
    }

    fn write_checkpoint(&mut self, candidate_hex: &str) -> io::Result<()> {
        self.checkpoint = Some(candidate_hex.to_string());
        Ok(())
    }
}

/// Logs every sample at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, sample: &ProgressSample, total_keys_checked: u64) {
        log::debug!(
            target: "search",
            "worker {}: {} keys ({:.0}/s), last {} | total {}",
            sample.worker_index,
            sample.keys_checked,
            sample.rate,
            sample.last_candidate_hex,
            total_keys_checked
        );
    }
}

/// Reads back a match log written by [`FileSink`].
pub fn read_match_log(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("btc_range_finder-{}-{}", name, nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_match(n: u8) -> Match {
        Match {
            candidate_hex: format!("{:064x}", n),
            address: format!("1Address{}", n),
            secret_export: format!("KWif{}", n),
        }
    }

    #[test]
    fn test_match_log_appends_in_order() {
        let dir = scratch_dir("log");
        let mut sink = FileSink::new(dir.join("keys.txt"), dir.join("last_key.txt"));

        sink.record_match(&sample_match(1)).unwrap();
        sink.record_match(&sample_match(2)).unwrap();

        let lines = read_match_log(sink.match_log()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!(
                "Private key: {:064x}, WIF: KWif1, Address: 1Address1",
                1
            )
        );
        assert!(lines[1].ends_with("Address: 1Address2"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_checkpoint_is_overwritten() {
        let dir = scratch_dir("checkpoint");
        let mut sink = FileSink::new(dir.join("keys.txt"), dir.join("last_key.txt"));

        sink.write_checkpoint("aa").unwrap();
        sink.write_checkpoint("bb").unwrap();

        let text = fs::read_to_string(sink.checkpoint()).unwrap();
        assert_eq!(text, "Last key tried: bb");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_unwritable_log_reports_error() {
        let mut sink = FileSink::new("/nonexistent/dir/keys.txt", "/nonexistent/dir/last.txt");
        assert!(sink.record_match(&sample_match(1)).is_err());
        assert!(sink.write_checkpoint("aa").is_err());
    }
}
