//! Cryptographic operations for Bitcoin key and address derivation.
//!
//! This module provides:
//! - Base58Check encoding
//! - The `CryptoProvider` capability backed by secp256k1
//! - Candidate key to address / WIF derivation

pub mod base58;
mod derive;
mod provider;

pub use derive::{
    derive_address, derive_identity, derive_secret_export, DerivedIdentity, ADDRESS_VERSION,
    COMPRESSED_FLAG, EXPORT_VERSION, KEY_LEN,
};
pub use provider::{CryptoError, CryptoProvider, Secp256k1Provider};
