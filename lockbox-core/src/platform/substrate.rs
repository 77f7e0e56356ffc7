//! Persisted key-value substrate trait.

use crate::error::LockboxResult;

/// Minimal persisted key-value store underneath a backend.
///
/// Two instances back the storage engine: a plain store and an
/// authenticated store whose key material is held by the platform secure
/// keystore. The authenticated instance reports
/// [`LockboxError::AuthenticationRequired`](crate::LockboxError::AuthenticationRequired)
/// from any operation while that key material needs fresh user
/// verification.
///
/// A store that has not been created yet reports
/// [`LockboxError::SubstrateUnavailable`](crate::LockboxError::SubstrateUnavailable);
/// read paths treat that as an empty store.
pub trait PreferenceStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> LockboxResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: &str, value: &[u8]) -> LockboxResult<()>;

    /// Removes the entry stored under `key`. Removing an absent key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, key: &str) -> LockboxResult<()>;

    /// Removes every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    fn clear(&self) -> LockboxResult<()>;

    /// Lists every raw key currently in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    fn keys(&self) -> LockboxResult<Vec<String>>;

    /// Reports whether `key` currently holds a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn contains(&self, key: &str) -> LockboxResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
