//! Elliptic-curve and hashing primitives used by the derivation pipeline.

use ripemd::Ripemd160;
use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Errors reported by a [`CryptoProvider`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Secret key is outside the curve order")]
    InvalidSecretKey,

    #[error("Expected a 32-byte secret key, got {0} bytes")]
    BadKeyLength(usize),
}

/// Trusted source of public-key derivation and hashing.
///
/// Implementations must be deterministic; the search engine shares one
/// provider between all workers.
pub trait CryptoProvider: Send + Sync {
    /// Derives the serialized public key for `secret`.
    fn public_key_from_private(
        &self,
        secret: &[u8],
        compressed: bool,
    ) -> Result<Vec<u8>, CryptoError>;

    /// SHA-256 digest.
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// RIPEMD-160 digest.
    fn ripemd160(&self, data: &[u8]) -> [u8; 20];

    /// `RIPEMD160(SHA256(data))`.
    fn hash160(&self, data: &[u8]) -> [u8; 20] {
        self.ripemd160(&self.sha256(data))
    }
}

/// libsecp256k1-backed provider.
#[derive(Debug, Clone)]
pub struct Secp256k1Provider {
    secp: Secp256k1<All>,
}

impl Secp256k1Provider {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for Secp256k1Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for Secp256k1Provider {
    #[inline]
    fn public_key_from_private(
        &self,
        secret: &[u8],
        compressed: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        if secret.len() != 32 {
            return Err(CryptoError::BadKeyLength(secret.len()));
        }
        let secret_key =
            SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidSecretKey)?;
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);

        Ok(if compressed {
            public_key.serialize().to_vec()
        } else {
            public_key.serialize_uncompressed().to_vec()
        })
    }

    #[inline]
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    #[inline]
    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        Ripemd160::digest(data).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    }

    #[test]
    fn test_generator_point() {
        let provider = Secp256k1Provider::new();
        let compressed = provider.public_key_from_private(&key_one(), true).unwrap();
        assert_eq!(
            hex::encode(&compressed),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );

        let uncompressed = provider.public_key_from_private(&key_one(), false).unwrap();
        assert_eq!(uncompressed.len(), 65);
        assert_eq!(uncompressed[0], 0x04);
    }

    #[test]
    fn test_rejects_invalid_keys() {
        let provider = Secp256k1Provider::new();
        assert_eq!(
            provider.public_key_from_private(&[0u8; 32], true),
            Err(CryptoError::InvalidSecretKey)
        );
        assert_eq!(
            provider.public_key_from_private(&[0xff; 32], true),
            Err(CryptoError::InvalidSecretKey)
        );
        assert_eq!(
            provider.public_key_from_private(&[1u8; 31], true),
            Err(CryptoError::BadKeyLength(31))
        );
    }

    #[test]
    fn test_hash160_of_generator() {
        let provider = Secp256k1Provider::new();
        let public_key = provider.public_key_from_private(&key_one(), true).unwrap();
        assert_eq!(
            hex::encode(provider.hash160(&public_key)),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }
}
