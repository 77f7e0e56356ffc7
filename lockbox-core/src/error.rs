//! Error types for lockbox storage operations.

use thiserror::Error;

/// Result type for lockbox storage operations.
pub type LockboxResult<T> = Result<T, LockboxError>;

/// Errors raised by lockbox storage components.
///
/// Decode-level errors are handled inside the backend that produced them and
/// authentication errors inside the retry machine; everything else propagates
/// unmodified to the dispatch layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockboxError {
    /// The ciphertext was not produced by the algorithm/key it was decoded
    /// with. Recovered locally by falling back to the previous cipher.
    #[error("ciphertext does not match cipher v{version}")]
    CipherMismatch {
        /// Version of the cipher that rejected the ciphertext.
        version: u32,
    },

    /// The entry could not be decoded under any known cipher. Surfaced to
    /// the caller; the entry itself is left untouched.
    #[error("entry '{key}' is not decodable under any known cipher")]
    CorruptEntry {
        /// Prefixed key of the undecodable entry.
        key: String,
    },

    /// The authenticated substrate's key material requires fresh user
    /// verification before it becomes usable.
    #[error("user authentication required: {0}")]
    AuthenticationRequired(String),

    /// The persisted store does not exist yet. Read operations treat this
    /// as an empty store.
    #[error("substrate unavailable: {0}")]
    SubstrateUnavailable(String),

    /// Errors coming from the persisted key-value substrate.
    #[error("substrate error: {0}")]
    Substrate(String),

    /// Errors coming from the device keystore.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// Cryptographic failures other than a cipher mismatch (AEAD seal, key
    /// material handling).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Bookkeeping record serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration rejected at the call boundary.
    #[error("invalid configuration '{parameter}': {reason}")]
    InvalidConfiguration {
        /// Name of the offending configuration field.
        parameter: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The storage service's worker queue has shut down and no longer
    /// accepts requests.
    #[error("storage service is shut down")]
    ServiceShutDown,
}
