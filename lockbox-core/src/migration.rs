//! One-shot migration of plain-store entries into the authenticated store.

use crate::backend::{empty_if_unavailable, visible_key};
use crate::cipher::{CipherFactory, StorageCipher};
use crate::config::StorageConfiguration;
use crate::error::LockboxResult;
use crate::platform::{DeviceKeystore, PreferenceStore};
use crate::types::StorageEntry;

/// Counters reported by one migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries decrypted, rewritten into the target, and removed from the
    /// source.
    pub migrated: usize,
    /// Entries left in place because no known cipher could decode them.
    pub skipped: usize,
}

/// Moves prefixed entries from the plain store into the authenticated
/// store, then retires superseded cipher bookkeeping.
///
/// The pass is at-least-once idempotent: a source entry is deleted only
/// after its destination write succeeded, so re-running after a partial
/// failure (process killed mid-loop) re-processes exactly the entries still
/// present in the source, without duplicating or corrupting anything.
pub struct MigrationEngine<'a> {
    source: &'a dyn PreferenceStore,
    target: &'a dyn PreferenceStore,
    factory: CipherFactory<'a>,
    config: &'a StorageConfiguration,
}

impl<'a> MigrationEngine<'a> {
    /// Creates an engine migrating `source` entries into `target`.
    #[must_use]
    pub fn new(
        source: &'a dyn PreferenceStore,
        target: &'a dyn PreferenceStore,
        keystore: &'a dyn DeviceKeystore,
        config: &'a StorageConfiguration,
    ) -> Self {
        Self {
            source,
            target,
            factory: CipherFactory::new(source, keystore, &config.store_name),
            config,
        }
    }

    /// Runs one migration pass.
    ///
    /// Entries that fail to decode under both cipher generations are
    /// skipped with a warning and left in the source. Substrate failures
    /// abort the pass; the caller retries on the next store access.
    ///
    /// # Errors
    ///
    /// Returns an error if cipher bookkeeping cannot be read or a substrate
    /// write/remove fails.
    pub fn run(&self) -> LockboxResult<MigrationReport> {
        let entries = self.pending_entries()?;
        let mut report = MigrationReport::default();
        if entries.is_empty() {
            self.factory.retire_previous()?;
            return Ok(report);
        }

        let active = self.factory.active_cipher()?;
        let previous = self.factory.previous_cipher()?;
        for entry in entries {
            let Some(plaintext) = decode(active.as_ref(), previous.as_deref(), &entry.value)
            else {
                log::warn!(
                    "leaving undecodable entry '{}' in the plain store",
                    entry.key
                );
                report.skipped += 1;
                continue;
            };
            self.target.put(&entry.key, &plaintext)?;
            self.source.remove(&entry.key)?;
            report.migrated += 1;
        }

        self.factory.retire_previous()?;
        log::info!(
            "migrated {} entries to the authenticated store ({} skipped)",
            report.migrated,
            report.skipped
        );
        Ok(report)
    }

    fn pending_entries(&self) -> LockboxResult<Vec<StorageEntry>> {
        let raw_keys = empty_if_unavailable(self.source.keys(), Vec::new())?;
        let mut entries = Vec::new();
        for raw_key in raw_keys {
            if visible_key(&raw_key, self.config).is_none() {
                continue;
            }
            if let Some(value) = self.source.get(&raw_key)? {
                entries.push(StorageEntry {
                    key: raw_key,
                    value,
                });
            }
        }
        Ok(entries)
    }
}

fn decode(
    active: &dyn StorageCipher,
    previous: Option<&dyn StorageCipher>,
    blob: &[u8],
) -> Option<Vec<u8>> {
    if let Ok(plaintext) = active.decrypt(blob) {
        return Some(plaintext);
    }
    previous.and_then(|cipher| cipher.decrypt(blob).ok())
}
