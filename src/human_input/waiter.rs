use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::human_input::store::QueryStore;
use crate::human_input::types::AwaitOutcome;

/// Per-query suspension primitive.
///
/// Each waiting invocation owns a `oneshot` receiver keyed by its query id;
/// the callback side resolves it through [`ResponseWaiter::complete`]. The
/// wait itself never decides who won a race: when the deadline elapses, the
/// waiter attempts the store's `Pending -> Expired` transition, and if that
/// loses to a concurrently recorded answer, the answer is returned instead.
/// Exactly one outcome is ever delivered to the caller.
#[derive(Debug)]
pub struct ResponseWaiter {
    store: Arc<QueryStore>,
    pending: Mutex<HashMap<String, oneshot::Sender<String>>>,
}

impl ResponseWaiter {
    /// Create a waiter bound to the store that adjudicates resolution
    pub fn new(store: Arc<QueryStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Suspend the calling invocation until the query resolves or `deadline`
    /// elapses.
    ///
    /// Wakes immediately when [`ResponseWaiter::complete`] delivers the
    /// answer. On timeout the query is marked expired through the store; if
    /// that transition loses to an answer that arrived concurrently (for
    /// example because callback delivery failed and only the store was
    /// updated), the recorded answer is returned rather than a timeout.
    #[instrument(skip(self))]
    pub async fn wait_for(&self, id: &str, deadline: Duration) -> Result<AwaitOutcome> {
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.insert(id.to_string(), sender).is_some() {
                warn!("Replaced existing waiter registration for query {}", id);
            }
        }

        debug!("Waiting up to {:?} for query {}", deadline, id);

        match timeout(deadline, receiver).await {
            Ok(Ok(answer)) => {
                debug!("Woken with answer for query {}", id);
                Ok(AwaitOutcome::Answered(answer))
            }
            Ok(Err(_)) => {
                // Sender dropped without sending: our registration was
                // replaced or the process is shutting down. The store still
                // knows the truth.
                self.deregister(id).await;
                match self.store.get(id).await {
                    Ok(query) => match query.answer {
                        Some(text) => Ok(AwaitOutcome::Answered(text)),
                        None => Err(Error::ChannelClosed),
                    },
                    Err(_) => Err(Error::ChannelClosed),
                }
            }
            Err(_) => {
                self.deregister(id).await;
                match self.store.mark_expired(id).await {
                    Ok(()) => {
                        debug!("Query {} timed out", id);
                        Ok(AwaitOutcome::TimedOut)
                    }
                    Err(Error::AlreadyResolved) => {
                        // The answer won the race against our deadline.
                        let query = self.store.get(id).await?;
                        match query.answer {
                            Some(text) => {
                                debug!("Answer for {} beat the timeout", id);
                                Ok(AwaitOutcome::Answered(text))
                            }
                            // Expired by someone else (the sweeper); still a timeout
                            None => Ok(AwaitOutcome::TimedOut),
                        }
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Deliver an answer to the invocation waiting on `id`.
    ///
    /// Returns `true` if a waiter was woken. Unknown ids are dropped with a
    /// warning: the answer is already durable in the store, so a missing
    /// waiter only means the caller gave up or lives behind a failed
    /// callback, and its own timeout path will pick the answer up.
    pub async fn complete(&self, id: &str, answer: impl Into<String>) -> bool {
        let sender = self.pending.lock().await.remove(id);
        match sender {
            Some(sender) => match sender.send(answer.into()) {
                Ok(()) => {
                    debug!("Delivered answer to waiter for query {}", id);
                    true
                }
                Err(_) => {
                    debug!("Waiter for query {} is gone; answer stays in the store", id);
                    false
                }
            },
            None => {
                warn!("No waiter registered for query {}; dropping wake signal", id);
                false
            }
        }
    }

    async fn deregister(&self, id: &str) {
        self.pending.lock().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::human_input::types::{QueryRequest, QueryState};
    use tokio::time::sleep;

    fn setup() -> (Arc<QueryStore>, Arc<ResponseWaiter>) {
        let store = Arc::new(QueryStore::new());
        let waiter = Arc::new(ResponseWaiter::new(Arc::clone(&store)));
        (store, waiter)
    }

    #[tokio::test]
    async fn test_completed_wait_returns_answer() {
        let (store, waiter) = setup();
        let query = store.create(QueryRequest::new("ready?")).await;

        let wait_task = tokio::spawn({
            let waiter = Arc::clone(&waiter);
            let id = query.id.clone();
            async move { waiter.wait_for(&id, Duration::from_secs(5)).await }
        });

        // Give the wait task time to register
        sleep(Duration::from_millis(50)).await;

        store.mark_answered(&query.id, "yes").await.unwrap();
        assert!(waiter.complete(&query.id, "yes").await);

        let outcome = wait_task.await.unwrap().unwrap();
        assert_eq!(outcome, AwaitOutcome::Answered("yes".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires_query() {
        let (store, waiter) = setup();
        let query = store.create(QueryRequest::new("anyone?")).await;

        let outcome = waiter
            .wait_for(&query.id, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(outcome, AwaitOutcome::TimedOut);

        let fetched = store.get(&query.id).await.unwrap();
        assert_eq!(fetched.state, QueryState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_answer_beats_timeout_without_wake() {
        // The answer reaches the store but the wake signal is lost, as when
        // callback delivery fails. The waiter must still return the answer.
        let (store, waiter) = setup();
        let query = store.create(QueryRequest::new("lost wake")).await;

        store.mark_answered(&query.id, "made it").await.unwrap();

        let outcome = waiter
            .wait_for(&query.id, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(outcome, AwaitOutcome::Answered("made it".to_string()));
    }

    #[tokio::test]
    async fn test_complete_unknown_id_is_dropped() {
        let (_store, waiter) = setup();
        assert!(!waiter.complete("no-such-id", "hello").await);
    }

    #[tokio::test]
    async fn test_complete_after_caller_gave_up() {
        let (store, waiter) = setup();
        let query = store.create(QueryRequest::new("gone")).await;

        let wait_task = tokio::spawn({
            let waiter = Arc::clone(&waiter);
            let id = query.id.clone();
            async move { waiter.wait_for(&id, Duration::from_secs(30)).await }
        });
        sleep(Duration::from_millis(50)).await;
        wait_task.abort();
        let _ = wait_task.await;

        // The receiver is gone, so delivery reports false; the store keeps
        // the answer either way.
        store.mark_answered(&query.id, "too late").await.unwrap();
        assert!(!waiter.complete(&query.id, "too late").await);
    }
}
