//! Caller-supplied storage configuration.
//!
//! A [`StorageConfiguration`] travels with every operation and is never
//! persisted by the backends. Malformed configuration is rejected here, at
//! the boundary, before any backend logic runs.

use crate::error::{LockboxError, LockboxResult};

/// Default prefix namespacing every stored entry key.
pub const DEFAULT_KEY_PREFIX: &str = "lockbox";

/// Default logical store name.
pub const DEFAULT_STORE_NAME: &str = "lockbox_store";

/// Default re-authentication validity window, in seconds.
pub const DEFAULT_REAUTH_TIMEOUT_SECS: u32 = 1;

/// Parameters for the external authentication challenge.
///
/// Presence of this value on a [`StorageConfiguration`] is what selects the
/// authenticated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Title shown by the platform verification prompt.
    pub prompt_title: String,
    /// Subtitle shown by the platform verification prompt.
    pub prompt_subtitle: String,
    /// How long a successful verification stays valid, in seconds. Enforced
    /// by the authenticator, not by this crate.
    pub reauth_timeout_secs: u32,
}

impl AuthPolicy {
    /// Creates a policy with the default re-authentication window.
    #[must_use]
    pub fn new(prompt_title: impl Into<String>, prompt_subtitle: impl Into<String>) -> Self {
        Self {
            prompt_title: prompt_title.into(),
            prompt_subtitle: prompt_subtitle.into(),
            reauth_timeout_secs: DEFAULT_REAUTH_TIMEOUT_SECS,
        }
    }
}

/// Per-operation configuration bag.
///
/// Supplied by the caller on every operation and immutable for its duration.
/// It may change between operations: a caller can legitimately address the
/// same logical store through either backend across calls, and the migration
/// engine keeps both views consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfiguration {
    /// Prefix namespacing entry keys in the substrate. Entries without it
    /// are invisible to `read_all`.
    pub key_prefix: String,
    /// Logical store name; scopes cipher bookkeeping and the one-shot
    /// migration mark.
    pub store_name: String,
    /// When set, a terminal failure wipes the active backend and reports a
    /// reset instead of the error.
    pub reset_on_error: bool,
    /// Authentication challenge parameters. `Some` selects the
    /// authenticated backend, `None` the plain one.
    pub auth_policy: Option<AuthPolicy>,
}

impl Default for StorageConfiguration {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            reset_on_error: false,
            auth_policy: None,
        }
    }
}

impl StorageConfiguration {
    /// Validates the configuration at the call boundary.
    ///
    /// # Errors
    ///
    /// Returns [`LockboxError::InvalidConfiguration`] naming the offending
    /// field when a value is unusable.
    pub fn validate(&self) -> LockboxResult<()> {
        if self.key_prefix.is_empty() {
            return Err(invalid("key_prefix", "must not be empty"));
        }
        if self.store_name.is_empty() {
            return Err(invalid("store_name", "must not be empty"));
        }
        if let Some(policy) = &self.auth_policy {
            if policy.prompt_title.is_empty() {
                return Err(invalid("auth_policy.prompt_title", "must not be empty"));
            }
            if policy.reauth_timeout_secs == 0 {
                return Err(invalid(
                    "auth_policy.reauth_timeout_secs",
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// Namespaces a logical key with the configured prefix.
    #[must_use]
    pub fn add_prefix_to_key(&self, key: &str) -> String {
        format!("{}_{key}", self.key_prefix)
    }
}

fn invalid(parameter: &str, reason: &str) -> LockboxError {
    LockboxError::InvalidConfiguration {
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}
