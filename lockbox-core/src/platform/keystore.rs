//! Device keystore trait for hardware-backed key wrapping.

use crate::error::LockboxResult;

/// Device-protected encryption used to wrap cipher key material.
///
/// Platform implementations should use hardware-backed keystores where
/// available (Keychain Services on iOS, the Android Keystore, `WebCrypto`
/// non-extractable keys in a browser). The device key MUST be
/// non-exportable where the platform supports it, and implementations MUST
/// use authenticated encryption.
///
/// The `associated_data` parameter provides domain separation and MUST be
/// included in the AEAD authentication tag computation.
pub trait DeviceKeystore: Send + Sync {
    /// Encrypts `plaintext` with the device-bound key.
    ///
    /// Returns the ciphertext, including nonce and authentication tag.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails (e.g. keystore unavailable).
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> LockboxResult<Vec<u8>>;

    /// Decrypts ciphertext previously produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails (tampered data or wrong
    /// associated data), the ciphertext is malformed, or the keystore is
    /// unavailable.
    fn open(&self, associated_data: &[u8], ciphertext: &[u8]) -> LockboxResult<Vec<u8>>;
}
