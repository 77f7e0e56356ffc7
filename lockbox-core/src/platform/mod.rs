//! Platform integration boundary.
//!
//! The storage engine reaches the device through these traits: a persisted
//! [`PreferenceStore`] pair (plain and authenticated), a [`DeviceKeystore`]
//! wrapping cipher key material, and an [`Authenticator`] driving the
//! user-verification flow. [`memory`] ships in-memory implementations for
//! tests.

mod authenticator;
mod keystore;
pub mod memory;
mod substrate;

pub use authenticator::{Authenticator, ChallengeOutcome, ChallengeTicket};
pub use keystore::DeviceKeystore;
pub use substrate::PreferenceStore;
