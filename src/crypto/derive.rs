//! Candidate key -> (address, secret export) derivation.
//!
//! Every function here is pure apart from calls into the [`CryptoProvider`];
//! a candidate that cannot be derived yields `None` rather than an error.

use super::base58;
use super::provider::CryptoProvider;

/// Width of a candidate key in bytes.
pub const KEY_LEN: usize = 32;

/// Version byte of a mainnet pay-to-pubkey-hash address.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Version byte of a mainnet secret export (WIF).
pub const EXPORT_VERSION: u8 = 0x80;

/// Suffix marking the export as belonging to a compressed public key.
pub const COMPRESSED_FLAG: u8 = 0x01;

/// The public and secret encodings of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    pub address: String,
    pub secret_export: String,
}

fn key_bytes(candidate_hex: &str) -> Option<[u8; KEY_LEN]> {
    let raw = hex::decode(candidate_hex).ok()?;
    raw.try_into().ok()
}

/// Derives the compressed P2PKH address for a 64-digit hex candidate.
pub fn derive_address<P: CryptoProvider + ?Sized>(
    provider: &P,
    candidate_hex: &str,
) -> Option<String> {
    let key = key_bytes(candidate_hex)?;
    let public_key = provider.public_key_from_private(&key, true).ok()?;
    let hash = provider.hash160(&public_key);

    let mut payload = [0u8; 21];
    payload[0] = ADDRESS_VERSION;
    payload[1..].copy_from_slice(&hash);

    Some(base58::encode_checked(&payload))
}

/// Derives the compressed WIF export for a 64-digit hex candidate.
///
/// The export does not need the curve, but keys outside its order are still
/// rejected so that every exported key is spendable.
pub fn derive_secret_export<P: CryptoProvider + ?Sized>(
    provider: &P,
    candidate_hex: &str,
) -> Option<String> {
    let key = key_bytes(candidate_hex)?;
    provider.public_key_from_private(&key, true).ok()?;

    let mut payload = [0u8; KEY_LEN + 2];
    payload[0] = EXPORT_VERSION;
    payload[1..=KEY_LEN].copy_from_slice(&key);
    payload[KEY_LEN + 1] = COMPRESSED_FLAG;

    Some(base58::encode_checked(&payload))
}

/// Derives both encodings at once.
pub fn derive_identity<P: CryptoProvider + ?Sized>(
    provider: &P,
    candidate_hex: &str,
) -> Option<DerivedIdentity> {
    Some(DerivedIdentity {
        address: derive_address(provider, candidate_hex)?,
        secret_export: derive_secret_export(provider, candidate_hex)?,
    })
}
