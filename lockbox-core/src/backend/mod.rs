//! Storage backends and per-call backend selection.

mod authenticated;
mod plain;

pub use authenticated::AuthenticatedBackend;
pub use plain::PlainBackend;

use std::collections::BTreeMap;

use crate::config::StorageConfiguration;
use crate::error::{LockboxError, LockboxResult};
use crate::types::{Operation, StorageResponse};

/// Which backend a configuration addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Unauthenticated store with cipher-encoded values.
    Plain,
    /// Store gated by user re-authentication.
    Authenticated,
}

/// Per-call backend choice: an authentication policy selects the
/// authenticated backend, its absence the plain one.
///
/// Pure function of the configuration, re-evaluated on every operation; no
/// backend reference is shared or cached across calls.
#[must_use]
pub fn select_backend(config: &StorageConfiguration) -> BackendKind {
    if config.auth_policy.is_some() {
        BackendKind::Authenticated
    } else {
        BackendKind::Plain
    }
}

/// The six storage operations shared by both backends.
pub trait Backend {
    /// Reports whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate cannot be probed.
    fn contains_key(&self, key: &str) -> LockboxResult<bool>;

    /// Reads and decodes one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate read or the decode fails.
    fn read(&self, key: &str) -> LockboxResult<Option<Vec<u8>>>;

    /// Reads every entry visible under the configured prefix, with the
    /// prefix stripped from the returned keys.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration or any decode fails.
    fn read_all(&self) -> LockboxResult<BTreeMap<String, Vec<u8>>>;

    /// Encodes and writes one value.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the substrate write fails.
    fn write(&self, key: &str, value: &[u8]) -> LockboxResult<()>;

    /// Deletes one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate removal fails.
    fn delete(&self, key: &str) -> LockboxResult<()>;

    /// Deletes every entry in the backend's store.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate cannot be cleared.
    fn delete_all(&self) -> LockboxResult<()>;

    /// Runs one captured operation against this backend.
    ///
    /// # Errors
    ///
    /// Propagates the underlying operation's error.
    fn execute(&self, operation: &Operation) -> LockboxResult<StorageResponse> {
        match operation {
            Operation::ContainsKey { key } => {
                self.contains_key(key).map(StorageResponse::Present)
            }
            Operation::Read { key } => self.read(key).map(StorageResponse::Value),
            Operation::ReadAll => self.read_all().map(StorageResponse::Entries),
            Operation::Write { key, value } => {
                self.write(key, value).map(|()| StorageResponse::Done)
            }
            Operation::Delete { key } => self.delete(key).map(|()| StorageResponse::Done),
            Operation::DeleteAll => self.delete_all().map(|()| StorageResponse::Done),
        }
    }
}

/// Maps "store not created yet" to an empty read result.
pub(crate) fn empty_if_unavailable<T>(result: LockboxResult<T>, fallback: T) -> LockboxResult<T> {
    match result {
        Err(LockboxError::SubstrateUnavailable(_)) => Ok(fallback),
        other => other,
    }
}

/// Returns the caller-visible key for a raw substrate key, or `None` when
/// the raw key does not carry the configured prefix or is one of the cipher
/// bookkeeping slots.
///
/// Mirrors the substrate's historical contract: visibility is a contains
/// test, and the first `{prefix}_` occurrence is what gets stripped.
pub(crate) fn visible_key(raw: &str, config: &StorageConfiguration) -> Option<String> {
    if is_bookkeeping_key(raw, &config.store_name) || !raw.contains(&config.key_prefix) {
        return None;
    }
    Some(raw.replacen(&format!("{}_", config.key_prefix), "", 1))
}

/// Reports whether `raw` is one of the cipher bookkeeping slots for
/// `store_name`. Bookkeeping is invisible to entry enumeration even when a
/// store name happens to contain the entry prefix.
pub(crate) fn is_bookkeeping_key(raw: &str, store_name: &str) -> bool {
    raw == crate::cipher::active_descriptor_key(store_name)
        || raw == crate::cipher::previous_descriptor_key(store_name)
}
