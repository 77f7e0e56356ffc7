//! Dedicated worker queue for storage requests.
//!
//! Every [`StorageService`] owns one worker thread. Requests are processed
//! strictly in arrival order, one at a time, so the persisted stores see no
//! concurrent mutation from this component and no internal locking is
//! needed beyond the migration marks. The retry machine's challenge wait
//! blocks the worker, which is also the documented answer to a request
//! arriving mid-challenge: it queues behind the pending one.

use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::config::StorageConfiguration;
use crate::error::{LockboxError, LockboxResult};
use crate::handler::StorageHandler;
use crate::types::{Operation, StorageResponse};

/// Receives the terminal outcome of one submitted request.
///
/// Exactly one of the two methods is invoked, from the worker thread;
/// marshalling back to the caller's context is the dispatch layer's
/// concern.
pub trait ResponseSink: Send {
    /// Called with the operation's successful result.
    fn on_success(self: Box<Self>, response: StorageResponse);

    /// Called with the operation's terminal error.
    fn on_failure(self: Box<Self>, error: LockboxError);
}

impl ResponseSink for mpsc::Sender<LockboxResult<StorageResponse>> {
    fn on_success(self: Box<Self>, response: StorageResponse) {
        let _ = self.send(Ok(response));
    }

    fn on_failure(self: Box<Self>, error: LockboxError) {
        let _ = self.send(Err(error));
    }
}

struct Job {
    operation: Operation,
    config: StorageConfiguration,
    sink: Box<dyn ResponseSink>,
}

/// Serialized storage front door: one worker thread, strict arrival order.
///
/// Dropping the service closes the queue; the worker drains the requests
/// already submitted and exits.
pub struct StorageService {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl StorageService {
    /// Spawns the worker thread over `handler`.
    #[must_use]
    pub fn spawn(handler: StorageHandler) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                match handler.execute(job.operation, &job.config) {
                    Ok(response) => job.sink.on_success(response),
                    Err(error) => job.sink.on_failure(error),
                }
            }
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Enqueues one operation; `sink` receives the terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`LockboxError::ServiceShutDown`] when the worker queue has
    /// already been closed.
    pub fn submit(
        &self,
        operation: Operation,
        config: StorageConfiguration,
        sink: Box<dyn ResponseSink>,
    ) -> LockboxResult<()> {
        let Some(sender) = &self.sender else {
            return Err(LockboxError::ServiceShutDown);
        };
        sender
            .send(Job {
                operation,
                config,
                sink,
            })
            .map_err(|_| LockboxError::ServiceShutDown)
    }
}

impl Drop for StorageService {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued jobs and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::AuthPolicy;
    use crate::platform::memory::{
        GatedPreferenceStore, MemoryKeystore, MemoryPreferenceStore,
    };
    use crate::platform::{Authenticator, ChallengeOutcome, ChallengeTicket};

    use super::*;

    struct ApprovingAuthenticator;

    impl Authenticator for ApprovingAuthenticator {
        fn authenticate(&self, _policy: &AuthPolicy, ticket: ChallengeTicket) {
            ticket.resolve(ChallengeOutcome::Succeeded);
        }
    }

    fn service() -> StorageService {
        StorageService::spawn(StorageHandler::new(
            Arc::new(MemoryPreferenceStore::new()),
            Arc::new(GatedPreferenceStore::new()),
            Arc::new(MemoryKeystore::new()),
            Arc::new(ApprovingAuthenticator),
        ))
    }

    #[test]
    fn test_submit_and_receive_result() {
        let service = service();
        let config = StorageConfiguration::default();
        let (tx, rx) = mpsc::channel();

        service
            .submit(
                Operation::Write {
                    key: "k".to_string(),
                    value: b"v".to_vec(),
                },
                config.clone(),
                Box::new(tx.clone()),
            )
            .unwrap();
        assert_eq!(rx.recv().unwrap(), Ok(StorageResponse::Done));

        service
            .submit(
                Operation::Read {
                    key: "k".to_string(),
                },
                config,
                Box::new(tx),
            )
            .unwrap();
        assert_eq!(
            rx.recv().unwrap(),
            Ok(StorageResponse::Value(Some(b"v".to_vec())))
        );
    }

    #[test]
    fn test_requests_complete_in_arrival_order() {
        let service = service();
        let config = StorageConfiguration::default();
        let (tx, rx) = mpsc::channel();

        for i in 0..10u8 {
            service
                .submit(
                    Operation::Write {
                        key: format!("k{i}"),
                        value: vec![i],
                    },
                    config.clone(),
                    Box::new(tx.clone()),
                )
                .unwrap();
            service
                .submit(
                    Operation::Read {
                        key: format!("k{i}"),
                    },
                    config.clone(),
                    Box::new(tx.clone()),
                )
                .unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(rx.recv().unwrap(), Ok(StorageResponse::Done));
            assert_eq!(
                rx.recv().unwrap(),
                Ok(StorageResponse::Value(Some(vec![i])))
            );
        }
    }

    #[test]
    fn test_drop_drains_pending_requests() {
        let service = service();
        let config = StorageConfiguration::default();
        let (tx, rx) = mpsc::channel();
        service
            .submit(
                Operation::Write {
                    key: "k".to_string(),
                    value: b"v".to_vec(),
                },
                config,
                Box::new(tx),
            )
            .unwrap();
        drop(service);
        assert_eq!(rx.recv().unwrap(), Ok(StorageResponse::Done));
    }
}
