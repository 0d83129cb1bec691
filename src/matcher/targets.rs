//! Immutable set of addresses a search is looking for.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::base58;

/// Errors that can occur while loading a target list.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Failed to read target file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address {address:?} on line {line}: {reason}")]
    InvalidAddress {
        address: String,
        line: usize,
        reason: base58::DecodeError,
    },
}

/// A set of textual addresses, shared read-only by every worker.
///
/// There is no way to mutate the set once it is built; workers hold it
/// behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    addresses: HashSet<String>,
}

impl TargetSet {
    /// Builds a set from already-trusted addresses.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a wallet list: one address per line, blank lines and `#`
    /// comments ignored. Each address must carry a valid Base58Check checksum.
    pub fn parse(text: &str) -> Result<Self, TargetError> {
        let mut addresses = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            base58::decode_checked(line).map_err(|reason| TargetError::InvalidAddress {
                address: line.to_string(),
                line: idx + 1,
                reason,
            })?;
            addresses.insert(line.to_string());
        }

        Ok(Self { addresses })
    }

    /// Loads a wallet list from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TargetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TargetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Returns a new set containing the addresses of both sets.
    pub fn union(&self, other: &TargetSet) -> TargetSet {
        Self {
            addresses: self.addresses.union(&other.addresses).cloned().collect(),
        }
    }

    /// Returns true if `address` is one of the targets.
    #[inline]
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
