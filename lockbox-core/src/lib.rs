//! Lockbox: authentication-gated encrypted key-value storage.
//!
//! This crate implements an on-device secure key-value store that switches,
//! per operation, between a plain persisted store and one gated by user
//! re-authentication, while migrating encrypted entries across cipher
//! generations without data loss.
//!
//! # Architecture
//!
//! The engine has four layers:
//!
//! 1. **Backends** — the [`backend::PlainBackend`] encodes values with the
//!    active cipher over the unauthenticated substrate; the
//!    [`backend::AuthenticatedBackend`] passes values through to a
//!    substrate whose key material may demand fresh user verification.
//!    Backend choice is a pure function of the per-call
//!    [`StorageConfiguration`].
//!
//! 2. **Cipher selection** — [`cipher::CipherFactory`] records which cipher
//!    generation is active, keeps the superseded generation readable while
//!    a migration is pending, and retires it afterwards.
//!
//! 3. **Migration** — [`migration::MigrationEngine`] runs once per store
//!    name on first authenticated access, rewriting plain-store entries
//!    into the authenticated store and deleting each source copy only
//!    after its destination write succeeded.
//!
//! 4. **Authentication retry** — an explicit state machine captures an
//!    operation that failed because re-authentication is required, drives
//!    one external challenge, and replays the captured operation exactly
//!    once on success. The caller never observes the intermediate failure.
//!
//! # Platform Integration
//!
//! The engine reaches the device through traits:
//!
//! - [`platform::PreferenceStore`] — persisted key-value substrate, one
//!   plain and one authenticated instance
//! - [`platform::DeviceKeystore`] — hardware-backed wrapping of cipher key
//!   material
//! - [`platform::Authenticator`] — the user-verification flow
//!
//! [`platform::memory`] provides in-memory implementations for tests.

pub mod backend;
pub mod cipher;
pub mod config;
mod error;
pub mod handler;
pub mod migration;
pub mod platform;
mod retry;
pub mod types;
pub mod worker;

pub use config::{AuthPolicy, StorageConfiguration};
pub use error::{LockboxError, LockboxResult};
pub use handler::StorageHandler;
pub use types::{Operation, StorageEntry, StorageResponse};
pub use worker::{ResponseSink, StorageService};
