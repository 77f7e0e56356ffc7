//! Plain backend: cipher-encoded values over the unauthenticated substrate.

use std::collections::BTreeMap;

use crate::cipher::{CipherFactory, StorageCipher};
use crate::config::StorageConfiguration;
use crate::error::{LockboxError, LockboxResult};
use crate::platform::{DeviceKeystore, PreferenceStore};

use super::{empty_if_unavailable, visible_key, Backend};

/// Key-value operations over the unauthenticated persisted store.
///
/// Writes always encode with the active cipher. Reads fall back to the
/// previous cipher generation on a mismatch, transparently covering entries
/// not yet rewritten by the migration engine; an entry failing both
/// generations is reported as corrupt and left untouched.
pub struct PlainBackend<'a> {
    substrate: &'a dyn PreferenceStore,
    factory: CipherFactory<'a>,
    config: &'a StorageConfiguration,
}

impl<'a> PlainBackend<'a> {
    /// Creates a backend for one operation.
    #[must_use]
    pub fn new(
        substrate: &'a dyn PreferenceStore,
        keystore: &'a dyn DeviceKeystore,
        config: &'a StorageConfiguration,
    ) -> Self {
        Self {
            substrate,
            factory: CipherFactory::new(substrate, keystore, &config.store_name),
            config,
        }
    }

    fn decode(
        active: &dyn StorageCipher,
        previous: Option<&dyn StorageCipher>,
        key: &str,
        blob: &[u8],
    ) -> LockboxResult<Vec<u8>> {
        match active.decrypt(blob) {
            Ok(plaintext) => Ok(plaintext),
            Err(LockboxError::CipherMismatch { .. }) => previous
                .map_or_else(
                    || Err(corrupt(key)),
                    |cipher| cipher.decrypt(blob).map_err(|_| corrupt(key)),
                ),
            Err(other) => Err(other),
        }
    }
}

fn corrupt(key: &str) -> LockboxError {
    LockboxError::CorruptEntry {
        key: key.to_string(),
    }
}

impl Backend for PlainBackend<'_> {
    fn contains_key(&self, key: &str) -> LockboxResult<bool> {
        empty_if_unavailable(self.substrate.contains(key), false)
    }

    fn read(&self, key: &str) -> LockboxResult<Option<Vec<u8>>> {
        let Some(blob) = empty_if_unavailable(self.substrate.get(key), None)? else {
            return Ok(None);
        };
        let active = self.factory.active_cipher()?;
        match active.decrypt(&blob) {
            Ok(plaintext) => Ok(Some(plaintext)),
            // Only a mismatch reaches for the previous generation.
            Err(LockboxError::CipherMismatch { .. }) => self
                .factory
                .previous_cipher()?
                .map_or_else(
                    || Err(corrupt(key)),
                    |cipher| cipher.decrypt(&blob).map_err(|_| corrupt(key)),
                )
                .map(Some),
            Err(other) => Err(other),
        }
    }

    fn read_all(&self) -> LockboxResult<BTreeMap<String, Vec<u8>>> {
        let raw_keys = empty_if_unavailable(self.substrate.keys(), Vec::new())?;
        let mut entries = BTreeMap::new();
        if raw_keys.is_empty() {
            return Ok(entries);
        }
        let active = self.factory.active_cipher()?;
        let previous = self.factory.previous_cipher()?;
        for raw_key in raw_keys {
            let Some(key) = visible_key(&raw_key, self.config) else {
                continue;
            };
            let Some(blob) = self.substrate.get(&raw_key)? else {
                continue;
            };
            let plaintext =
                Self::decode(active.as_ref(), previous.as_deref(), &raw_key, &blob)?;
            entries.insert(key, plaintext);
        }
        Ok(entries)
    }

    fn write(&self, key: &str, value: &[u8]) -> LockboxResult<()> {
        let blob = self.factory.active_cipher()?.encrypt(value)?;
        self.substrate.put(key, &blob)
    }

    fn delete(&self, key: &str) -> LockboxResult<()> {
        self.substrate.remove(key)
    }

    fn delete_all(&self) -> LockboxResult<()> {
        self.substrate.clear()
    }
}
