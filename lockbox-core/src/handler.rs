//! Request handling: validation, backend selection, recovery policy.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::backend::{
    select_backend, AuthenticatedBackend, Backend, BackendKind, PlainBackend,
};
use crate::config::StorageConfiguration;
use crate::error::{LockboxError, LockboxResult};
use crate::platform::{Authenticator, DeviceKeystore, PreferenceStore};
use crate::retry::run_with_reauth;
use crate::types::{Operation, StorageResponse};

/// Storage front door for the dispatch layer.
///
/// Owns the platform handles and the one-shot migration marks. Backends are
/// constructed fresh per operation from the caller's configuration; nothing
/// about a previous call's backend choice is carried over.
pub struct StorageHandler {
    plain: Arc<dyn PreferenceStore>,
    authenticated: Arc<dyn PreferenceStore>,
    keystore: Arc<dyn DeviceKeystore>,
    authenticator: Arc<dyn Authenticator>,
    migrated_stores: Mutex<HashSet<String>>,
}

impl StorageHandler {
    /// Creates a handler over the platform's two substrate instances, its
    /// keystore, and its authenticator.
    #[must_use]
    pub fn new(
        plain: Arc<dyn PreferenceStore>,
        authenticated: Arc<dyn PreferenceStore>,
        keystore: Arc<dyn DeviceKeystore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            plain,
            authenticated,
            keystore,
            authenticator,
            migrated_stores: Mutex::new(HashSet::new()),
        }
    }

    /// Validates the configuration, namespaces the operation's key, selects
    /// a backend, and runs the operation through the authentication retry
    /// machine. With `reset_on_error` set, a terminal failure triggers a
    /// best-effort wipe of the active backend and reports
    /// [`StorageResponse::Reset`] instead.
    ///
    /// # Errors
    ///
    /// Returns the operation's terminal error, or the wipe's own error when
    /// a reset was attempted and failed.
    pub fn execute(
        &self,
        operation: Operation,
        config: &StorageConfiguration,
    ) -> LockboxResult<StorageResponse> {
        config.validate()?;
        let operation = operation.prefixed(config);
        let result = self.dispatch(&operation, config);
        match result {
            Err(cause) if config.reset_on_error => self.reset(config, &cause),
            other => other,
        }
    }

    fn dispatch(
        &self,
        operation: &Operation,
        config: &StorageConfiguration,
    ) -> LockboxResult<StorageResponse> {
        match select_backend(config) {
            BackendKind::Plain => {
                let backend =
                    PlainBackend::new(self.plain.as_ref(), self.keystore.as_ref(), config);
                run_with_reauth(&backend, self.authenticator.as_ref(), None, operation.clone())
            }
            BackendKind::Authenticated => {
                let backend = AuthenticatedBackend::new(
                    self.authenticated.as_ref(),
                    self.plain.as_ref(),
                    self.keystore.as_ref(),
                    config,
                    &self.migrated_stores,
                );
                run_with_reauth(
                    &backend,
                    self.authenticator.as_ref(),
                    config.auth_policy.as_ref(),
                    operation.clone(),
                )
            }
        }
    }

    /// Best-effort wipe of the active backend after a terminal failure,
    /// trading data loss for self-healing from an unrecoverable cipher or
    /// key state.
    fn reset(
        &self,
        config: &StorageConfiguration,
        cause: &LockboxError,
    ) -> LockboxResult<StorageResponse> {
        log::info!(
            "resetting store '{}' after terminal failure: {cause}",
            config.store_name
        );
        match select_backend(config) {
            BackendKind::Plain => {
                PlainBackend::new(self.plain.as_ref(), self.keystore.as_ref(), config)
                    .delete_all()?;
            }
            BackendKind::Authenticated => {
                AuthenticatedBackend::new(
                    self.authenticated.as_ref(),
                    self.plain.as_ref(),
                    self.keystore.as_ref(),
                    config,
                    &self.migrated_stores,
                )
                .delete_all()?;
            }
        }
        Ok(StorageResponse::Reset)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AuthPolicy;
    use crate::platform::memory::{
        GatedPreferenceStore, MemoryKeystore, MemoryPreferenceStore,
    };
    use crate::platform::{ChallengeOutcome, ChallengeTicket};

    use super::*;

    struct ApprovingAuthenticator;

    impl Authenticator for ApprovingAuthenticator {
        fn authenticate(&self, _policy: &AuthPolicy, ticket: ChallengeTicket) {
            ticket.resolve(ChallengeOutcome::Succeeded);
        }
    }

    fn handler() -> StorageHandler {
        StorageHandler::new(
            Arc::new(MemoryPreferenceStore::new()),
            Arc::new(GatedPreferenceStore::new()),
            Arc::new(MemoryKeystore::new()),
            Arc::new(ApprovingAuthenticator),
        )
    }

    #[test]
    fn test_plain_write_read_with_logical_keys() {
        let handler = handler();
        let config = StorageConfiguration::default();

        handler
            .execute(
                Operation::Write {
                    key: "token".to_string(),
                    value: b"v".to_vec(),
                },
                &config,
            )
            .unwrap();
        let result = handler
            .execute(
                Operation::Read {
                    key: "token".to_string(),
                },
                &config,
            )
            .unwrap();
        assert_eq!(result, StorageResponse::Value(Some(b"v".to_vec())));
    }

    #[test]
    fn test_invalid_configuration_rejected_before_dispatch() {
        let handler = handler();
        let config = StorageConfiguration {
            key_prefix: String::new(),
            reset_on_error: true,
            ..StorageConfiguration::default()
        };
        // Boundary validation is not a terminal operation failure: no reset.
        assert!(matches!(
            handler.execute(Operation::ReadAll, &config),
            Err(LockboxError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_reset_on_error_reports_reset_and_wipes() {
        let plain = Arc::new(MemoryPreferenceStore::new());
        let handler = StorageHandler::new(
            Arc::clone(&plain) as Arc<dyn PreferenceStore>,
            Arc::new(GatedPreferenceStore::new()),
            Arc::new(MemoryKeystore::new()),
            Arc::new(ApprovingAuthenticator),
        );
        let config = StorageConfiguration {
            reset_on_error: true,
            ..StorageConfiguration::default()
        };

        handler
            .execute(
                Operation::Write {
                    key: "good".to_string(),
                    value: b"v".to_vec(),
                },
                &config,
            )
            .unwrap();
        // Plant an undecodable entry, then trip over it.
        plain.put("lockbox_bad", b"garbage bytes").unwrap();
        let result = handler
            .execute(
                Operation::Read {
                    key: "bad".to_string(),
                },
                &config,
            )
            .unwrap();
        assert_eq!(result, StorageResponse::Reset);

        // The wipe emptied the store.
        let result = handler.execute(Operation::ReadAll, &config).unwrap();
        assert_eq!(result, StorageResponse::Entries(std::collections::BTreeMap::new()));
    }

    #[test]
    fn test_corrupt_entry_surfaces_without_reset_flag() {
        let plain = Arc::new(MemoryPreferenceStore::new());
        let handler = StorageHandler::new(
            Arc::clone(&plain) as Arc<dyn PreferenceStore>,
            Arc::new(GatedPreferenceStore::new()),
            Arc::new(MemoryKeystore::new()),
            Arc::new(ApprovingAuthenticator),
        );
        let config = StorageConfiguration::default();

        handler
            .execute(
                Operation::Write {
                    key: "good".to_string(),
                    value: b"v".to_vec(),
                },
                &config,
            )
            .unwrap();
        plain.put("lockbox_bad", b"garbage bytes").unwrap();
        assert!(matches!(
            handler.execute(
                Operation::Read {
                    key: "bad".to_string()
                },
                &config
            ),
            Err(LockboxError::CorruptEntry { .. })
        ));
        // The entry was left untouched.
        assert!(plain.contains("lockbox_bad").unwrap());
    }
}
