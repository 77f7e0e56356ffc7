//! Cipher descriptor bookkeeping and selection.
//!
//! The plain substrate carries, per store name, up to two descriptor slots:
//! the active generation every write uses, and the previous generation kept
//! only while a migration is pending. Slots carry no entry prefix, so entry
//! enumeration never sees them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LockboxError, LockboxResult};
use crate::platform::{DeviceKeystore, PreferenceStore};

use super::{CipherAlgorithm, CipherKey, StorageCipher};

/// Associated data binding wrapped cipher keys to their bookkeeping slot.
pub const KEY_WRAP_AD: &[u8] = b"lockbox:cipher-key-wrap";

/// Substrate key of the active-descriptor slot for `store_name`.
#[must_use]
pub fn active_descriptor_key(store_name: &str) -> String {
    format!("{store_name}.cipher.active")
}

/// Substrate key of the previous-descriptor slot for `store_name`.
#[must_use]
pub fn previous_descriptor_key(store_name: &str) -> String {
    format!("{store_name}.cipher.previous")
}

/// Bookkeeping record identifying which cipher generation produced a set of
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherDescriptor {
    /// Stable cipher version number.
    pub version: u32,
    /// Algorithm recorded for that version.
    pub algorithm: CipherAlgorithm,
    /// Cipher key material sealed by the device keystore.
    pub wrapped_key: Vec<u8>,
}

impl CipherDescriptor {
    /// Serializes the descriptor to CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn serialize(&self) -> LockboxResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| LockboxError::Serialization(err.to_string()))?;
        Ok(bytes)
    }

    /// Deserializes a descriptor from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid descriptor or the
    /// recorded version does not match the recorded algorithm.
    pub fn deserialize(bytes: &[u8]) -> LockboxResult<Self> {
        let descriptor: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| LockboxError::Serialization(err.to_string()))?;
        if CipherAlgorithm::from_version(descriptor.version) != Some(descriptor.algorithm) {
            return Err(LockboxError::Serialization(format!(
                "descriptor records v{} for a mismatched algorithm",
                descriptor.version
            )));
        }
        Ok(descriptor)
    }

    /// Short log-safe identifier derived from the wrapped key material.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.wrapped_key);
        hex::encode(&digest[..4])
    }
}

/// Selects and instantiates ciphers from persisted descriptor bookkeeping.
pub struct CipherFactory<'a> {
    substrate: &'a dyn PreferenceStore,
    keystore: &'a dyn DeviceKeystore,
    store_name: &'a str,
}

impl<'a> CipherFactory<'a> {
    /// Creates a factory over the plain substrate's bookkeeping slots for
    /// `store_name`.
    #[must_use]
    pub const fn new(
        substrate: &'a dyn PreferenceStore,
        keystore: &'a dyn DeviceKeystore,
        store_name: &'a str,
    ) -> Self {
        Self {
            substrate,
            keystore,
            store_name,
        }
    }

    /// Returns the cipher for the recorded active generation.
    ///
    /// With no recorded descriptor, a current-version descriptor is created
    /// and persisted first. A recorded descriptor older than the current
    /// version is superseded: it moves into the previous slot and a fresh
    /// current-generation descriptor takes its place.
    ///
    /// # Errors
    ///
    /// Keystore and bookkeeping failures are reported, never swallowed: the
    /// caller must leave old data encrypted rather than write under a false
    /// assumption of security.
    pub fn active_cipher(&self) -> LockboxResult<Box<dyn StorageCipher>> {
        let current = CipherAlgorithm::current();
        match self.load(&active_descriptor_key(self.store_name))? {
            None => self.create_active(),
            Some(descriptor) if descriptor.version == current.version() => {
                self.unwrap_cipher(&descriptor)
            }
            Some(superseded) => {
                if let Some(stale) = self.load(&previous_descriptor_key(self.store_name))? {
                    // Single-step migration only: a still-pending previous
                    // generation is dropped when a third appears.
                    if stale != superseded {
                        log::warn!(
                            "dropping unmigrated cipher v{} ({}) superseded twice",
                            stale.version,
                            stale.fingerprint()
                        );
                    }
                }
                self.substrate.put(
                    &previous_descriptor_key(self.store_name),
                    &superseded.serialize()?,
                )?;
                log::info!(
                    "cipher v{} ({}) superseded by v{}",
                    superseded.version,
                    superseded.fingerprint(),
                    current.version()
                );
                self.create_active()
            }
        }
    }

    /// Returns the cipher for the previous generation, or `None` when no
    /// migration is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorded descriptor cannot be decoded or its
    /// key cannot be unwrapped.
    pub fn previous_cipher(&self) -> LockboxResult<Option<Box<dyn StorageCipher>>> {
        match self.load(&previous_descriptor_key(self.store_name))? {
            Some(descriptor) => Ok(Some(self.unwrap_cipher(&descriptor)?)),
            None => Ok(None),
        }
    }

    /// Clears the previous-generation slot.
    ///
    /// Called only after the migration engine has confirmed that every
    /// entry referencing the retired generation was rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed.
    pub fn retire_previous(&self) -> LockboxResult<()> {
        if let Some(descriptor) = self.load(&previous_descriptor_key(self.store_name))? {
            log::info!(
                "retiring cipher v{} ({})",
                descriptor.version,
                descriptor.fingerprint()
            );
        }
        self.substrate
            .remove(&previous_descriptor_key(self.store_name))
    }

    fn load(&self, slot: &str) -> LockboxResult<Option<CipherDescriptor>> {
        let bytes = match self.substrate.get(slot) {
            Ok(bytes) => bytes,
            Err(LockboxError::SubstrateUnavailable(_)) => None,
            Err(err) => return Err(err),
        };
        bytes
            .map(|bytes| CipherDescriptor::deserialize(&bytes))
            .transpose()
    }

    fn create_active(&self) -> LockboxResult<Box<dyn StorageCipher>> {
        let algorithm = CipherAlgorithm::current();
        let key = CipherKey::generate();
        let wrapped_key = self.keystore.seal(KEY_WRAP_AD, key.as_bytes())?;
        let descriptor = CipherDescriptor {
            version: algorithm.version(),
            algorithm,
            wrapped_key,
        };
        self.substrate.put(
            &active_descriptor_key(self.store_name),
            &descriptor.serialize()?,
        )?;
        Ok(algorithm.instantiate(key))
    }

    fn unwrap_cipher(&self, descriptor: &CipherDescriptor) -> LockboxResult<Box<dyn StorageCipher>> {
        let bytes = self.keystore.open(KEY_WRAP_AD, &descriptor.wrapped_key)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| {
            LockboxError::Crypto("unwrapped cipher key is not 32 bytes".to_string())
        })?;
        Ok(descriptor.algorithm.instantiate(CipherKey::from_bytes(key)))
    }
}
