//! Value types shared across backends, the retry machine, and dispatch.

use std::collections::BTreeMap;

use crate::config::StorageConfiguration;

/// A single persisted entry, as it sits in a substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Prefixed key under which the value is persisted.
    pub key: String,
    /// Encoded value bytes (ciphertext in the plain backend, raw bytes in
    /// the authenticated one).
    pub value: Vec<u8>,
}

/// A storage operation, replayable as a value.
///
/// Keys are namespaced by the handler before the operation reaches a
/// backend, so a captured operation re-runs byte-for-byte identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Report whether a key exists.
    ContainsKey {
        /// Key to probe.
        key: String,
    },
    /// Read one value.
    Read {
        /// Key to read.
        key: String,
    },
    /// Read every entry visible under the configured prefix.
    ReadAll,
    /// Write one value.
    Write {
        /// Key to write under.
        key: String,
        /// Plaintext value bytes.
        value: Vec<u8>,
    },
    /// Delete one entry.
    Delete {
        /// Key to delete.
        key: String,
    },
    /// Delete every entry in the backend's store.
    DeleteAll,
}

impl Operation {
    /// Returns the same operation with its key namespaced by the configured
    /// prefix. Operations without a key are unchanged.
    #[must_use]
    pub fn prefixed(self, config: &StorageConfiguration) -> Self {
        match self {
            Self::ContainsKey { key } => Self::ContainsKey {
                key: config.add_prefix_to_key(&key),
            },
            Self::Read { key } => Self::Read {
                key: config.add_prefix_to_key(&key),
            },
            Self::Write { key, value } => Self::Write {
                key: config.add_prefix_to_key(&key),
                value,
            },
            Self::Delete { key } => Self::Delete {
                key: config.add_prefix_to_key(&key),
            },
            keyless @ (Self::ReadAll | Self::DeleteAll) => keyless,
        }
    }
}

/// Successful outcome of a storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageResponse {
    /// Mutation completed.
    Done,
    /// Whether the probed key exists.
    Present(bool),
    /// The value read, or `None` when the key is absent.
    Value(Option<Vec<u8>>),
    /// All entries visible under the configured prefix, prefix stripped
    /// from the returned keys.
    Entries(BTreeMap<String, Vec<u8>>),
    /// A terminal failure was recovered by wiping the active backend
    /// (`reset_on_error`).
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixing_keyed_operations() {
        let config = StorageConfiguration::default();
        let op = Operation::Write {
            key: "token".to_string(),
            value: b"v".to_vec(),
        };
        match op.prefixed(&config) {
            Operation::Write { key, .. } => assert_eq!(key, "lockbox_token"),
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_prefixing_keyless_operations() {
        let config = StorageConfiguration::default();
        assert_eq!(Operation::ReadAll.prefixed(&config), Operation::ReadAll);
        assert_eq!(Operation::DeleteAll.prefixed(&config), Operation::DeleteAll);
    }
}
