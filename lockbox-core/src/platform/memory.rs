//! In-memory implementations of the platform traits for testing.
//!
//! These implementations are NOT secure for production use. They exist so
//! the storage engine can be exercised without a real platform keystore,
//! preference store, or verification UI.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{LockboxError, LockboxResult};

use super::{DeviceKeystore, PreferenceStore};

const KEYSTORE_NONCE_LEN: usize = 24;

/// In-memory preference store backed by a `BTreeMap`.
pub struct MemoryPreferenceStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the number of stored entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("store mutex poisoned").len()
    }

    /// Returns `true` when no entries are stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("store mutex poisoned").is_empty()
    }

    fn lock(&self) -> LockboxResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| LockboxError::Substrate("store mutex poisoned".to_string()))
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> LockboxResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> LockboxResult<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> LockboxResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> LockboxResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn keys(&self) -> LockboxResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// In-memory device keystore sealing with XChaCha20-Poly1305.
///
/// The "device key" lives in process memory, which is exactly what a real
/// keystore must never allow. Testing only.
pub struct MemoryKeystore {
    key: [u8; 32],
}

impl MemoryKeystore {
    /// Creates a keystore with a freshly generated random key.
    #[must_use]
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Creates a keystore with a fixed key, for deterministic tests.
    #[must_use]
    pub const fn with_key(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceKeystore for MemoryKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> LockboxResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce_bytes = [0u8; KEYSTORE_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|err| LockboxError::Keystore(err.to_string()))?;
        let mut out = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, associated_data: &[u8], ciphertext: &[u8]) -> LockboxResult<Vec<u8>> {
        if ciphertext.len() < KEYSTORE_NONCE_LEN {
            return Err(LockboxError::Keystore(
                "keystore ciphertext too short".to_string(),
            ));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(KEYSTORE_NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: payload,
                    aad: associated_data,
                },
            )
            .map_err(|err| LockboxError::Keystore(err.to_string()))
    }
}

/// Preference store that refuses every operation while "locked".
///
/// Models an authenticated platform store whose key material needs fresh
/// user verification: while locked, every call fails with
/// [`LockboxError::AuthenticationRequired`]. A test authenticator unlocks
/// it from its challenge handler.
pub struct GatedPreferenceStore {
    inner: MemoryPreferenceStore,
    locked: AtomicBool,
}

impl GatedPreferenceStore {
    /// Creates an unlocked store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryPreferenceStore::new(),
            locked: AtomicBool::new(false),
        }
    }

    /// Engages the gate: subsequent operations fail until [`unlock`](Self::unlock).
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Releases the gate.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Reports whether the gate is currently engaged.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn check_gate(&self) -> LockboxResult<()> {
        if self.is_locked() {
            return Err(LockboxError::AuthenticationRequired(
                "key material requires fresh user verification".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GatedPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for GatedPreferenceStore {
    fn get(&self, key: &str) -> LockboxResult<Option<Vec<u8>>> {
        self.check_gate()?;
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> LockboxResult<()> {
        self.check_gate()?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> LockboxResult<()> {
        self.check_gate()?;
        self.inner.remove(key)
    }

    fn clear(&self) -> LockboxResult<()> {
        self.check_gate()?;
        self.inner.clear()
    }

    fn keys(&self) -> LockboxResult<Vec<String>> {
        self.check_gate()?;
        self.inner.keys()
    }
}
