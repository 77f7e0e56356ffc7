//! Authentication-gated operation retry.
//!
//! When the authenticated substrate reports that fresh user verification is
//! needed, the failing operation is captured as a [`PendingOperation`], an
//! external challenge is issued, and on success the captured operation is
//! re-invoked exactly once. The caller never observes the intermediate
//! failure; a failed challenge surfaces the original triggering error.

use crate::backend::Backend;
use crate::config::AuthPolicy;
use crate::error::{LockboxError, LockboxResult};
use crate::platform::{Authenticator, ChallengeOutcome, ChallengeTicket};
use crate::types::{Operation, StorageResponse};

/// A suspended operation captured when an authentication-required failure
/// was observed. Destroyed on successful replay or on terminal failure of
/// the challenge.
#[derive(Debug)]
struct PendingOperation {
    operation: Operation,
    /// The original triggering error, surfaced verbatim if the challenge
    /// fails.
    cause: LockboxError,
}

/// Retry machine states. `Idle` and the terminal states are implicit in
/// function entry and return.
enum RetryState {
    Invoking { operation: Operation },
    AwaitingChallenge { pending: PendingOperation },
    ReplayInvoking { pending: PendingOperation },
}

/// Runs `operation` against `backend`, driving at most one authentication
/// challenge and one replay.
///
/// The challenge wait blocks the calling worker thread, so operations
/// arriving while a challenge is pending queue behind it in arrival order.
pub(crate) fn run_with_reauth(
    backend: &dyn Backend,
    authenticator: &dyn Authenticator,
    policy: Option<&AuthPolicy>,
    operation: Operation,
) -> LockboxResult<StorageResponse> {
    let mut state = RetryState::Invoking { operation };
    loop {
        state = match state {
            RetryState::Invoking { operation } => match backend.execute(&operation) {
                Ok(response) => return Ok(response),
                Err(cause @ LockboxError::AuthenticationRequired(_)) if policy.is_some() => {
                    RetryState::AwaitingChallenge {
                        pending: PendingOperation { operation, cause },
                    }
                }
                Err(other) => return Err(other),
            },
            RetryState::AwaitingChallenge { pending } => {
                let Some(policy) = policy else {
                    return Err(pending.cause);
                };
                match challenge(authenticator, policy) {
                    ChallengeOutcome::Succeeded => {
                        log::debug!("challenge succeeded, replaying suspended operation");
                        RetryState::ReplayInvoking { pending }
                    }
                    ChallengeOutcome::Failed => {
                        log::debug!("challenge failed, surfacing original cause");
                        return Err(pending.cause);
                    }
                    ChallengeOutcome::Error(reason) => {
                        log::debug!("challenge error ({reason}), surfacing original cause");
                        return Err(pending.cause);
                    }
                }
            }
            // Exactly one replay: whatever it produces is what the caller
            // receives, including a second authentication failure.
            RetryState::ReplayInvoking { pending } => {
                return backend.execute(&pending.operation)
            }
        };
    }
}

/// Issues one challenge and blocks until the authenticator resolves it.
fn challenge(authenticator: &dyn Authenticator, policy: &AuthPolicy) -> ChallengeOutcome {
    let (ticket, outcome) = ChallengeTicket::channel();
    authenticator.authenticate(policy, ticket);
    outcome.recv().unwrap_or_else(|_| {
        ChallengeOutcome::Error("authenticator dropped the challenge ticket".to_string())
    })
}
