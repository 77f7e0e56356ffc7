//! Value ciphers and the version registry.
//!
//! Every value the plain backend persists is encrypted by a
//! [`StorageCipher`]. Algorithms carry stable version numbers so entries
//! written under a superseded generation stay readable until the migration
//! engine rewrites them.

mod chacha;
mod factory;

pub use chacha::{ChaChaPolyCipher, XChaChaPolyCipher};
pub use factory::{
    active_descriptor_key, previous_descriptor_key, CipherDescriptor, CipherFactory, KEY_WRAP_AD,
};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::LockboxResult;

/// 256-bit cipher key material, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; 32]);

impl CipherKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes. Treat as sensitive material.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Known cipher algorithms, ordered by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    /// ChaCha20-Poly1305 with a 96-bit nonce. The original value encoding.
    ChaCha20Poly1305,
    /// XChaCha20-Poly1305 with a 192-bit nonce. Current.
    XChaCha20Poly1305,
}

impl CipherAlgorithm {
    /// Stable version number recorded in descriptors.
    #[must_use]
    pub const fn version(self) -> u32 {
        match self {
            Self::ChaCha20Poly1305 => 1,
            Self::XChaCha20Poly1305 => 2,
        }
    }

    /// The algorithm new entries are written with.
    #[must_use]
    pub const fn current() -> Self {
        Self::XChaCha20Poly1305
    }

    /// Resolves a recorded version number, or `None` for versions this
    /// build does not know.
    #[must_use]
    pub const fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::ChaCha20Poly1305),
            2 => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }

    /// Instantiates the algorithm over `key`.
    #[must_use]
    pub fn instantiate(self, key: CipherKey) -> Box<dyn StorageCipher> {
        match self {
            Self::ChaCha20Poly1305 => Box::new(ChaChaPolyCipher::new(key)),
            Self::XChaCha20Poly1305 => Box::new(XChaChaPolyCipher::new(key)),
        }
    }
}

/// Authenticated encryption over opaque byte payloads.
///
/// `encrypt` embeds a freshly generated nonce in the returned blob
/// (`[nonce || ciphertext + tag]`); `decrypt` fails with
/// [`LockboxError::CipherMismatch`](crate::LockboxError::CipherMismatch)
/// when the blob was not produced by this algorithm and key.
pub trait StorageCipher: Send + Sync {
    /// Algorithm identifier of this cipher.
    fn algorithm(&self) -> CipherAlgorithm;

    /// Encrypts `plaintext` under a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD seal fails.
    fn encrypt(&self, plaintext: &[u8]) -> LockboxResult<Vec<u8>>;

    /// Decrypts a blob previously produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns a cipher mismatch when the blob does not authenticate under
    /// this algorithm and key.
    fn decrypt(&self, ciphertext: &[u8]) -> LockboxResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mapping_round_trips() {
        for algorithm in [
            CipherAlgorithm::ChaCha20Poly1305,
            CipherAlgorithm::XChaCha20Poly1305,
        ] {
            assert_eq!(
                CipherAlgorithm::from_version(algorithm.version()),
                Some(algorithm)
            );
        }
        assert_eq!(CipherAlgorithm::from_version(0), None);
        assert_eq!(CipherAlgorithm::from_version(99), None);
    }

    #[test]
    fn test_current_is_highest_version() {
        assert_eq!(CipherAlgorithm::current().version(), 2);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = CipherKey::generate();
        assert!(!format!("{key:?}").contains("key: ["));
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
