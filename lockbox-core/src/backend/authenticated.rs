//! Authenticated backend: pass-through values over the authenticated
//! substrate, with a lazy one-shot migration check.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::config::StorageConfiguration;
use crate::error::LockboxResult;
use crate::migration::MigrationEngine;
use crate::platform::{DeviceKeystore, PreferenceStore};

use super::{empty_if_unavailable, visible_key, Backend};

/// Key-value operations over the authenticated persisted store.
///
/// Values pass through untouched: the authenticated substrate provides its
/// own at-rest encryption behind platform key material that may demand
/// fresh user verification. The first operation against a store name runs
/// the migration engine synchronously before proceeding, so a caller never
/// observes a mix of migrated and unmigrated state.
pub struct AuthenticatedBackend<'a> {
    substrate: &'a dyn PreferenceStore,
    plain_substrate: &'a dyn PreferenceStore,
    keystore: &'a dyn DeviceKeystore,
    config: &'a StorageConfiguration,
    migrated_stores: &'a Mutex<HashSet<String>>,
}

impl<'a> AuthenticatedBackend<'a> {
    /// Creates a backend for one operation.
    #[must_use]
    pub const fn new(
        substrate: &'a dyn PreferenceStore,
        plain_substrate: &'a dyn PreferenceStore,
        keystore: &'a dyn DeviceKeystore,
        config: &'a StorageConfiguration,
        migrated_stores: &'a Mutex<HashSet<String>>,
    ) -> Self {
        Self {
            substrate,
            plain_substrate,
            keystore,
            config,
            migrated_stores,
        }
    }

    /// Runs the one-shot migration for the configured store name if it has
    /// not completed yet. The store is marked migrated only on success, so
    /// a failed pass (including an authentication-required failure from the
    /// substrate) is retried on the next operation.
    fn ensure_migrated(&self) -> LockboxResult<()> {
        {
            let migrated = self
                .migrated_stores
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if migrated.contains(&self.config.store_name) {
                return Ok(());
            }
        }

        MigrationEngine::new(
            self.plain_substrate,
            self.substrate,
            self.keystore,
            self.config,
        )
        .run()?;

        self.migrated_stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.config.store_name.clone());
        Ok(())
    }
}

impl Backend for AuthenticatedBackend<'_> {
    fn contains_key(&self, key: &str) -> LockboxResult<bool> {
        self.ensure_migrated()?;
        empty_if_unavailable(self.substrate.contains(key), false)
    }

    fn read(&self, key: &str) -> LockboxResult<Option<Vec<u8>>> {
        self.ensure_migrated()?;
        empty_if_unavailable(self.substrate.get(key), None)
    }

    fn read_all(&self) -> LockboxResult<BTreeMap<String, Vec<u8>>> {
        self.ensure_migrated()?;
        let raw_keys = empty_if_unavailable(self.substrate.keys(), Vec::new())?;
        let mut entries = BTreeMap::new();
        for raw_key in raw_keys {
            let Some(key) = visible_key(&raw_key, self.config) else {
                continue;
            };
            if let Some(value) = self.substrate.get(&raw_key)? {
                entries.insert(key, value);
            }
        }
        Ok(entries)
    }

    fn write(&self, key: &str, value: &[u8]) -> LockboxResult<()> {
        self.ensure_migrated()?;
        self.substrate.put(key, value)
    }

    fn delete(&self, key: &str) -> LockboxResult<()> {
        self.ensure_migrated()?;
        self.substrate.remove(key)
    }

    fn delete_all(&self) -> LockboxResult<()> {
        self.ensure_migrated()?;
        self.substrate.clear()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LockboxError;
    use crate::platform::memory::{
        GatedPreferenceStore, MemoryKeystore, MemoryPreferenceStore,
    };

    use super::*;

    struct Fixture {
        plain: MemoryPreferenceStore,
        authenticated: GatedPreferenceStore,
        keystore: MemoryKeystore,
        config: StorageConfiguration,
        migrated: Mutex<HashSet<String>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                plain: MemoryPreferenceStore::new(),
                authenticated: GatedPreferenceStore::new(),
                keystore: MemoryKeystore::new(),
                config: StorageConfiguration::default(),
                migrated: Mutex::new(HashSet::new()),
            }
        }

        fn backend(&self) -> AuthenticatedBackend<'_> {
            AuthenticatedBackend::new(
                &self.authenticated,
                &self.plain,
                &self.keystore,
                &self.config,
                &self.migrated,
            )
        }
    }

    #[test]
    fn test_round_trip_without_cipher_encoding() {
        let fixture = Fixture::new();
        let backend = fixture.backend();

        backend.write("lockbox_k", b"v").unwrap();
        assert!(backend.contains_key("lockbox_k").unwrap());
        assert_eq!(backend.read("lockbox_k").unwrap(), Some(b"v".to_vec()));
        // Values pass through untouched; the substrate encrypts at rest.
        assert_eq!(
            fixture.authenticated.get("lockbox_k").unwrap(),
            Some(b"v".to_vec())
        );
    }

    #[test]
    fn test_first_operation_migrates_plain_entries() {
        let fixture = Fixture::new();
        {
            let plain_backend = crate::backend::PlainBackend::new(
                &fixture.plain,
                &fixture.keystore,
                &fixture.config,
            );
            plain_backend.write("lockbox_a", b"alpha").unwrap();
        }

        let backend = fixture.backend();
        assert_eq!(backend.read("lockbox_a").unwrap(), Some(b"alpha".to_vec()));
        assert!(!fixture.plain.contains("lockbox_a").unwrap());
    }

    #[test]
    fn test_failed_migration_is_retried() {
        let fixture = Fixture::new();
        {
            let plain_backend = crate::backend::PlainBackend::new(
                &fixture.plain,
                &fixture.keystore,
                &fixture.config,
            );
            plain_backend.write("lockbox_a", b"alpha").unwrap();
        }

        // While the gate is engaged the migration write fails and the
        // store must not be marked migrated.
        fixture.authenticated.lock();
        let backend = fixture.backend();
        assert!(matches!(
            backend.read("lockbox_a"),
            Err(LockboxError::AuthenticationRequired(_))
        ));
        assert!(fixture.plain.contains("lockbox_a").unwrap());

        fixture.authenticated.unlock();
        let backend = fixture.backend();
        assert_eq!(backend.read("lockbox_a").unwrap(), Some(b"alpha".to_vec()));
        assert!(!fixture.plain.contains("lockbox_a").unwrap());
    }

    #[test]
    fn test_read_all_strips_prefix() {
        let fixture = Fixture::new();
        let backend = fixture.backend();
        backend.write("lockbox_a", b"1").unwrap();
        backend.write("lockbox_b", b"2").unwrap();
        fixture.authenticated.put("unrelated", b"noise").unwrap();

        let entries = backend.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get("a"), Some(&b"1".to_vec()));
        assert_eq!(entries.get("b"), Some(&b"2".to_vec()));
    }

    #[test]
    fn test_migration_runs_once_per_store_name() {
        let fixture = Fixture::new();
        fixture.backend().write("lockbox_k", b"v").unwrap();

        // Entries written to the plain store after migration stay put:
        // the one-shot check does not run again for this store name.
        fixture.plain.put("lockbox_late", b"blob").unwrap();
        assert_eq!(fixture.backend().read("lockbox_late").unwrap(), None);
        assert!(fixture.plain.contains("lockbox_late").unwrap());
    }
}
