use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::human_input::types::CallbackPayload;
use crate::human_input::waiter::ResponseWaiter;

/// Delivers an answer from the side that received it to the side that is
/// waiting on it.
///
/// Delivery is fire-and-forget: the answer is already durable in the store
/// before `notify` runs, so a failed delivery is logged and the waiting side
/// falls back to polling or its own timeout. Implementations never retry.
#[async_trait]
pub trait CallbackDispatcher: Send + Sync + std::fmt::Debug {
    /// Send `answer` for query `id` to `target`.
    ///
    /// `target` is the callback address recorded when the query was created;
    /// in-process dispatchers may ignore it.
    async fn notify(&self, target: Option<&str>, id: &str, answer: &str) -> Result<()>;
}

/// In-process dispatcher that resolves the local waiter directly.
///
/// This is the single-process collapse of the callback round-trip: the
/// "network" between the human-facing side and the agent-facing side is a
/// map lookup.
#[derive(Debug)]
pub struct LocalCallbackDispatcher {
    waiter: Arc<ResponseWaiter>,
}

impl LocalCallbackDispatcher {
    /// Create a dispatcher that wakes waiters on the given registry
    pub fn new(waiter: Arc<ResponseWaiter>) -> Self {
        Self { waiter }
    }
}

#[async_trait]
impl CallbackDispatcher for LocalCallbackDispatcher {
    async fn notify(&self, _target: Option<&str>, id: &str, answer: &str) -> Result<()> {
        // A missing waiter is not a delivery failure: the caller may have
        // given up, and the answer is already recorded in the store.
        self.waiter.complete(id, answer).await;
        Ok(())
    }
}

/// Dispatcher that POSTs the answer to the callback URL recorded at query
/// creation, for deployments where the waiting invocation lives in another
/// process.
#[derive(Debug)]
pub struct HttpCallbackDispatcher {
    client: reqwest::Client,
}

impl HttpCallbackDispatcher {
    /// Create a dispatcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackDispatcher for HttpCallbackDispatcher {
    async fn notify(&self, target: Option<&str>, id: &str, answer: &str) -> Result<()> {
        let target = target.ok_or_else(|| {
            Error::DeliveryFailed("no callback target recorded for query".to_string())
        })?;

        let url = Url::parse(target).map_err(|_| Error::InvalidTarget(target.to_string()))?;

        debug!("Sending callback for query {} to {}", id, url);

        let payload = CallbackPayload {
            query_id: id.to_string(),
            response: answer.to_string(),
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::DeliveryFailed(format!("callback request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Callback for query {} rejected with status {}", id, status);
            return Err(Error::DeliveryFailed(format!(
                "callback returned status {}",
                status
            )));
        }

        debug!("Callback for query {} delivered", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::human_input::store::QueryStore;
    use crate::human_input::types::{AwaitOutcome, QueryRequest};
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_local_dispatch_wakes_waiter() {
        let store = Arc::new(QueryStore::new());
        let waiter = Arc::new(ResponseWaiter::new(Arc::clone(&store)));
        let dispatcher = LocalCallbackDispatcher::new(Arc::clone(&waiter));

        let query = store.create(QueryRequest::new("ping")).await;
        let wait_task = tokio::spawn({
            let waiter = Arc::clone(&waiter);
            let id = query.id.clone();
            async move { waiter.wait_for(&id, Duration::from_secs(5)).await }
        });
        sleep(Duration::from_millis(50)).await;

        store.mark_answered(&query.id, "pong").await.unwrap();
        dispatcher.notify(None, &query.id, "pong").await.unwrap();

        let outcome = wait_task.await.unwrap().unwrap();
        assert_eq!(outcome, AwaitOutcome::Answered("pong".to_string()));
    }

    #[tokio::test]
    async fn test_local_dispatch_tolerates_missing_waiter() {
        let store = Arc::new(QueryStore::new());
        let waiter = Arc::new(ResponseWaiter::new(store));
        let dispatcher = LocalCallbackDispatcher::new(waiter);

        // No waiter registered; delivery is still not an error
        assert!(dispatcher.notify(None, "unknown", "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_http_dispatch_requires_target() {
        let dispatcher = HttpCallbackDispatcher::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            dispatcher.notify(None, "q", "a").await,
            Err(Error::DeliveryFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_http_dispatch_rejects_bad_target() {
        let dispatcher = HttpCallbackDispatcher::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            dispatcher.notify(Some("not a url"), "q", "a").await,
            Err(Error::InvalidTarget(_))
        ));
    }
}
