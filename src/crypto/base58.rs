//! Base58Check text encoding.
//!
//! The digit conversion is delegated to `bs58`, which keeps one `1` for every
//! leading zero byte (so an all-zero payload of `n` bytes encodes to `n` ones
//! and the empty payload encodes to the empty string). The checksum is the
//! first four bytes of a double SHA-256.

use sha2::{Digest, Sha256};

/// The 58-symbol alphabet (no `0`, `O`, `I` or `l`).
pub const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of the Base58Check checksum in bytes.
pub const CHECKSUM_LEN: usize = 4;

/// Errors that can occur while decoding Base58 text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base58 character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },

    #[error("Payload too short to carry a checksum ({0} bytes)")]
    TooShort(usize),

    #[error("Checksum mismatch")]
    BadChecksum,
}

/// Encodes `bytes` as a big-endian number in base 58.
pub fn encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decodes Base58 text back into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    bs58::decode(text).into_vec().map_err(|e| match e {
        bs58::decode::Error::InvalidCharacter { character, index } => {
            DecodeError::InvalidCharacter { character, index }
        }
        // Anything else bs58 reports is a character it refused to map.
        _ => first_invalid(text),
    })
}

fn first_invalid(text: &str) -> DecodeError {
    text.char_indices()
        .find(|(_, c)| !ALPHABET.contains(*c))
        .map(|(index, character)| DecodeError::InvalidCharacter { character, index })
        .unwrap_or(DecodeError::InvalidCharacter {
            character: '\u{fffd}',
            index: 0,
        })
}

/// First four bytes of `SHA256(SHA256(payload))`.
pub fn checksum4(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Encodes `payload ++ checksum4(payload)`.
pub fn encode_checked(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum4(payload));
    encode(&data)
}

/// Decodes Base58Check text and verifies its checksum, returning the payload.
pub fn decode_checked(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut data = decode(text)?;
    if data.len() < CHECKSUM_LEN {
        return Err(DecodeError::TooShort(data.len()));
    }
    let split = data.len() - CHECKSUM_LEN;
    if data[split..] != checksum4(&data[..split]) {
        return Err(DecodeError::BadChecksum);
    }
    data.truncate(split);
    Ok(data)
}
