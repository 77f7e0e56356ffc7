//! External authenticator boundary.
//!
//! The authenticator owns the platform's user-verification UI and its
//! re-authentication validity window. This crate only issues a challenge
//! and waits for its outcome; it never times a challenge out on its own.

use std::sync::mpsc;

use crate::config::AuthPolicy;

/// Outcome of one authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The user verified successfully.
    Succeeded,
    /// The user failed or dismissed the challenge.
    Failed,
    /// The challenge could not be presented or errored out.
    Error(String),
}

/// Single-shot completion handle for one challenge.
///
/// The authenticator resolves the ticket exactly once, from any thread.
/// Dropping it unresolved is reported to the waiting operation as a
/// challenge error.
#[derive(Debug)]
pub struct ChallengeTicket {
    tx: mpsc::Sender<ChallengeOutcome>,
}

impl ChallengeTicket {
    /// Creates a ticket and the receiver the retry machine blocks on.
    pub(crate) fn channel() -> (Self, mpsc::Receiver<ChallengeOutcome>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Reports the challenge outcome.
    pub fn resolve(self, outcome: ChallengeOutcome) {
        // The waiting side may already be gone during shutdown.
        let _ = self.tx.send(outcome);
    }
}

/// Drives the platform's user-verification flow.
pub trait Authenticator: Send + Sync {
    /// Presents a challenge described by `policy` and resolves `ticket`
    /// with the outcome. Completion may arrive from any thread.
    fn authenticate(&self, policy: &AuthPolicy, ticket: ChallengeTicket);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_resolves_once_across_threads() {
        let (ticket, rx) = ChallengeTicket::channel();
        std::thread::spawn(move || {
            ticket.resolve(ChallengeOutcome::Succeeded);
        });
        assert_eq!(rx.recv(), Ok(ChallengeOutcome::Succeeded));
    }

    #[test]
    fn test_dropped_ticket_closes_channel() {
        let (ticket, rx) = ChallengeTicket::channel();
        drop(ticket);
        assert!(rx.recv().is_err());
    }
}
