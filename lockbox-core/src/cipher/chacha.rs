//! ChaCha20-Poly1305 cipher family.
//!
//! Both generations share the blob layout
//! `[nonce || ciphertext + Poly1305 tag]`; they differ only in nonce width.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{LockboxError, LockboxResult};

use super::{CipherAlgorithm, CipherKey, StorageCipher};

const TAG_LEN: usize = 16;
const CHACHA_NONCE_LEN: usize = 12;
const XCHACHA_NONCE_LEN: usize = 24;

fn mismatch(algorithm: CipherAlgorithm) -> LockboxError {
    LockboxError::CipherMismatch {
        version: algorithm.version(),
    }
}

/// ChaCha20-Poly1305 (96-bit nonce), cipher version 1.
pub struct ChaChaPolyCipher {
    key: CipherKey,
}

impl ChaChaPolyCipher {
    /// Creates the cipher over `key`.
    #[must_use]
    pub const fn new(key: CipherKey) -> Self {
        Self { key }
    }
}

impl StorageCipher for ChaChaPolyCipher {
    fn algorithm(&self) -> CipherAlgorithm {
        CipherAlgorithm::ChaCha20Poly1305
    }

    fn encrypt(&self, plaintext: &[u8]) -> LockboxResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        let mut nonce_bytes = [0u8; CHACHA_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| LockboxError::Crypto("chacha20-poly1305 encryption failed".to_string()))?;
        let mut out = Vec::with_capacity(CHACHA_NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> LockboxResult<Vec<u8>> {
        if ciphertext.len() < CHACHA_NONCE_LEN + TAG_LEN {
            return Err(mismatch(self.algorithm()));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(CHACHA_NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| mismatch(self.algorithm()))
    }
}

/// XChaCha20-Poly1305 (192-bit nonce), cipher version 2.
pub struct XChaChaPolyCipher {
    key: CipherKey,
}

impl XChaChaPolyCipher {
    /// Creates the cipher over `key`.
    #[must_use]
    pub const fn new(key: CipherKey) -> Self {
        Self { key }
    }
}

impl StorageCipher for XChaChaPolyCipher {
    fn algorithm(&self) -> CipherAlgorithm {
        CipherAlgorithm::XChaCha20Poly1305
    }

    fn encrypt(&self, plaintext: &[u8]) -> LockboxResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        let mut nonce_bytes = [0u8; XCHACHA_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| LockboxError::Crypto("xchacha20-poly1305 encryption failed".to_string()))?;
        let mut out = Vec::with_capacity(XCHACHA_NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> LockboxResult<Vec<u8>> {
        if ciphertext.len() < XCHACHA_NONCE_LEN + TAG_LEN {
            return Err(mismatch(self.algorithm()));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(XCHACHA_NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        cipher
            .decrypt(XNonce::from_slice(nonce_bytes), payload)
            .map_err(|_| mismatch(self.algorithm()))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn cipher_for(algorithm: CipherAlgorithm, key: CipherKey) -> Box<dyn StorageCipher> {
        algorithm.instantiate(key)
    }

    #[test_case(CipherAlgorithm::ChaCha20Poly1305; "v1")]
    #[test_case(CipherAlgorithm::XChaCha20Poly1305; "v2")]
    fn test_round_trip(algorithm: CipherAlgorithm) {
        let cipher = cipher_for(algorithm, CipherKey::generate());
        let plaintext = b"a value worth protecting";
        let blob = cipher.encrypt(plaintext).unwrap();
        assert_ne!(&blob[..plaintext.len()], plaintext);
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }

    #[test_case(CipherAlgorithm::ChaCha20Poly1305; "v1")]
    #[test_case(CipherAlgorithm::XChaCha20Poly1305; "v2")]
    fn test_fresh_nonce_per_encryption(algorithm: CipherAlgorithm) {
        let cipher = cipher_for(algorithm, CipherKey::generate());
        let first = cipher.encrypt(b"same plaintext").unwrap();
        let second = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(first, second);
    }

    #[test_case(CipherAlgorithm::ChaCha20Poly1305; "v1")]
    #[test_case(CipherAlgorithm::XChaCha20Poly1305; "v2")]
    fn test_tampered_blob_is_a_mismatch(algorithm: CipherAlgorithm) {
        let cipher = cipher_for(algorithm, CipherKey::generate());
        let mut blob = cipher.encrypt(b"payload").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(matches!(
            cipher.decrypt(&blob),
            Err(LockboxError::CipherMismatch { .. })
        ));
    }

    #[test_case(CipherAlgorithm::ChaCha20Poly1305; "v1")]
    #[test_case(CipherAlgorithm::XChaCha20Poly1305; "v2")]
    fn test_short_blob_is_a_mismatch(algorithm: CipherAlgorithm) {
        let cipher = cipher_for(algorithm, CipherKey::generate());
        let version = algorithm.version();
        assert_eq!(
            cipher.decrypt(&[0u8; 8]),
            Err(LockboxError::CipherMismatch { version })
        );
    }

    #[test]
    fn test_cross_generation_blobs_mismatch() {
        let key = CipherKey::generate();
        let v1 = ChaChaPolyCipher::new(key.clone());
        let v2 = XChaChaPolyCipher::new(key);

        let v1_blob = v1.encrypt(b"written under v1").unwrap();
        assert!(matches!(
            v2.decrypt(&v1_blob),
            Err(LockboxError::CipherMismatch { version: 2 })
        ));

        let v2_blob = v2.encrypt(b"written under v2").unwrap();
        assert!(matches!(
            v1.decrypt(&v2_blob),
            Err(LockboxError::CipherMismatch { version: 1 })
        ));
    }

    #[test]
    fn test_wrong_key_is_a_mismatch() {
        let writer = XChaChaPolyCipher::new(CipherKey::generate());
        let reader = XChaChaPolyCipher::new(CipherKey::generate());
        let blob = writer.encrypt(b"payload").unwrap();
        assert!(matches!(
            reader.decrypt(&blob),
            Err(LockboxError::CipherMismatch { .. })
        ));
    }
}
