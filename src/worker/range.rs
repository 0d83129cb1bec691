//! Keyspace ranges and their static partition across workers.

use std::fmt;

use primitive_types::U256;

use crate::crypto::KEY_LEN;

/// Errors produced when building a [`KeyRange`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Empty range: min {min} must be below max {max}")]
    Empty { min: U256, max: U256 },

    #[error("Puzzle number must be between 1 and 160, got {0}")]
    BadPuzzle(u32),
}

/// Half-open interval `[min, max)` of candidate keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    min: U256,
    max: U256,
}

impl KeyRange {
    pub fn new(min: U256, max: U256) -> Result<Self, RangeError> {
        if min >= max {
            return Err(RangeError::Empty { min, max });
        }
        Ok(Self { min, max })
    }

    /// Range of the numbered Bitcoin puzzle: `[2^(n-1), 2^n)`.
    pub fn puzzle(n: u32) -> Result<Self, RangeError> {
        if !(1..=160).contains(&n) {
            return Err(RangeError::BadPuzzle(n));
        }
        let min = U256::one() << (n - 1);
        let max = U256::one() << n;
        Self::new(min, max)
    }

    pub fn min(&self) -> U256 {
        self.min
    }

    pub fn max(&self) -> U256 {
        self.max
    }

    /// Number of candidates in the range.
    pub fn size(&self) -> U256 {
        self.max - self.min
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.min, self.max)
    }
}

/// One worker's share of a range: every `stride`-th key starting at
/// `min + index`.
///
/// For `stride` workers with indices `0..stride`, the sequences are disjoint
/// and together cover the range exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub index: usize,
    pub stride: usize,
}

impl WorkerAssignment {
    pub fn new(index: usize, stride: usize) -> Self {
        debug_assert!(stride > 0 && index < stride);
        Self { index, stride }
    }

    /// Offset of the first candidate from `range.min()`.
    pub fn start_offset(&self) -> usize {
        self.index
    }

    /// Iterates this worker's candidates in ascending order.
    pub fn candidates(&self, range: &KeyRange) -> Candidates {
        let next = range.min().checked_add(U256::from(self.start_offset()));
        Candidates {
            next: next.filter(|k| *k < range.max()),
            max: range.max(),
            stride: U256::from(self.stride),
        }
    }
}

/// Iterator over a [`WorkerAssignment`]'s keys.
#[derive(Debug, Clone)]
pub struct Candidates {
    next: Option<U256>,
    max: U256,
    stride: U256,
}

impl Iterator for Candidates {
    type Item = U256;

    #[inline]
    fn next(&mut self) -> Option<U256> {
        let current = self.next?;
        self.next = current
            .checked_add(self.stride)
            .filter(|k| *k < self.max);
        Some(current)
    }
}

/// Renders a candidate as fixed-width (64 digit) lowercase hex.
pub fn candidate_hex(key: U256) -> String {
    let mut bytes = [0u8; KEY_LEN];
    key.to_big_endian(&mut bytes);
    hex::encode(bytes)
}

/// Parses a bound written in decimal or as `0x`-prefixed hex.
pub fn parse_key(text: &str) -> Option<U256> {
    let text = text.trim().replace('_', "");
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex_digits) if !hex_digits.is_empty() => U256::from_str_radix(hex_digits, 16).ok(),
        Some(_) => None,
        None if !text.is_empty() => U256::from_dec_str(&text).ok(),
        None => None,
    }
}
