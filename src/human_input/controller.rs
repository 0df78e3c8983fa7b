use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::config::QuerySettings;
use crate::error::Result;
use crate::human_input::dispatch::{CallbackDispatcher, LocalCallbackDispatcher};
use crate::human_input::store::QueryStore;
use crate::human_input::types::{
    AwaitOutcome, HumanQuery, PendingQuery, QueryRequest, QueryStats,
};
use crate::human_input::waiter::ResponseWaiter;
use crate::telemetry;

/// Configuration for the query lifecycle
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long `await_answer` waits before giving up
    pub answer_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            answer_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&QuerySettings> for ControllerConfig {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            answer_timeout: Duration::from_secs(settings.answer_timeout_secs),
        }
    }
}

/// Orchestrates query creation, answering, expiry and cleanup.
///
/// This is the only surface external collaborators call: the orchestration
/// layer submits a query and awaits its answer; the human-facing transport
/// lists pending queries and submits answers. The store adjudicates every
/// race, the waiter suspends the asking invocation, and the dispatcher
/// carries answers back across whatever boundary separates the two sides.
#[derive(Debug)]
pub struct QueryLifecycleController {
    store: Arc<QueryStore>,
    waiter: Arc<ResponseWaiter>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    config: ControllerConfig,
}

impl QueryLifecycleController {
    /// Create a controller over explicit collaborators
    pub fn new(
        store: Arc<QueryStore>,
        waiter: Arc<ResponseWaiter>,
        dispatcher: Arc<dyn CallbackDispatcher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            waiter,
            dispatcher,
            config,
        }
    }

    /// Wire up a single-process controller: one store, one waiter, and an
    /// in-process dispatcher that wakes waiters directly.
    pub fn local(config: ControllerConfig) -> Self {
        let store = Arc::new(QueryStore::new());
        let waiter = Arc::new(ResponseWaiter::new(Arc::clone(&store)));
        let dispatcher = Arc::new(LocalCallbackDispatcher::new(Arc::clone(&waiter)));
        Self::new(store, waiter, dispatcher, config)
    }

    /// Register a new query and return its id.
    ///
    /// The caller is expected to follow up with [`Self::await_answer`] in
    /// the same logical request; [`Self::ask`] does both.
    #[instrument(skip(self, request), fields(question = %request.question))]
    pub async fn submit_query(&self, request: QueryRequest) -> String {
        let query = self.store.create(request).await;
        info!("Query {} submitted", query.id);
        telemetry::add_metric("queries_created", 1.0, &[]);
        query.id
    }

    /// Block until the query is answered or the default timeout elapses
    pub async fn await_answer(&self, id: &str) -> Result<AwaitOutcome> {
        self.await_answer_with_timeout(id, self.config.answer_timeout)
            .await
    }

    /// Block until the query is answered or `deadline` elapses
    #[instrument(skip(self))]
    pub async fn await_answer_with_timeout(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<AwaitOutcome> {
        let outcome = self.waiter.wait_for(id, deadline).await?;
        match &outcome {
            AwaitOutcome::Answered(_) => {
                telemetry::add_metric("queries_resolved", 1.0, &[("outcome", "answered".into())]);
            }
            AwaitOutcome::TimedOut => {
                info!("Query {} timed out after {:?}", id, deadline);
                telemetry::add_metric("queries_resolved", 1.0, &[("outcome", "timed_out".into())]);
            }
        }
        Ok(outcome)
    }

    /// Submit a query and wait for its answer as one logical call.
    ///
    /// This is the shape of the "ask a human" tool call: bounded wall-clock
    /// duration, a normal `TimedOut` outcome when nobody answers.
    pub async fn ask(&self, request: QueryRequest) -> Result<AwaitOutcome> {
        let id = self.submit_query(request).await;
        self.await_answer(&id).await
    }

    /// Record a human answer and notify the waiting side.
    ///
    /// The store transition comes first and is the only adjudicator: once it
    /// succeeds the answer is accepted, even if the follow-up notification
    /// cannot be delivered (the waiting side then falls back to polling or
    /// its timeout). A duplicate or late submission is rejected with
    /// [`crate::error::Error::AlreadyResolved`].
    #[instrument(skip(self, answer))]
    pub async fn submit_answer(&self, id: &str, answer: impl Into<String> + Send) -> Result<()> {
        let answer = answer.into();
        let resolved = self.store.mark_answered(id, answer.clone()).await?;
        info!("Query {} answered", id);
        telemetry::add_metric("queries_answered", 1.0, &[]);

        if let Err(e) = self
            .dispatcher
            .notify(resolved.callback_url.as_deref(), id, &answer)
            .await
        {
            // The answer is durable in the store; the waiter's own timeout
            // path will pick it up.
            warn!("Callback for query {} not delivered: {}", id, e);
            telemetry::add_metric("callback_failures", 1.0, &[]);
        }

        Ok(())
    }

    /// Receiving side of a callback notification: wake the local waiter for
    /// `id`. Unknown ids are dropped with a warning, not an error.
    pub async fn resolve_callback(&self, id: &str, answer: &str) -> bool {
        self.waiter.complete(id, answer).await
    }

    /// All queries still waiting for an answer, oldest first, projected for
    /// the human-facing side
    pub async fn list_pending_queries(&self) -> Vec<PendingQuery> {
        self.store
            .list_pending()
            .await
            .iter()
            .map(PendingQuery::from)
            .collect()
    }

    /// Full query record, including resolution state
    pub async fn get_query(&self, id: &str) -> Result<HumanQuery> {
        self.store.get(id).await
    }

    /// Counts of queries per state, for health and readiness endpoints
    pub async fn stats(&self) -> QueryStats {
        self.store.stats().await
    }

    /// Spawn a background task that periodically expires pending queries
    /// older than the configured answer timeout.
    ///
    /// This is the safety net for callers that abandoned their wait without
    /// resolving the query. Returns a handle whose [`SweeperHandle::stop`]
    /// ends the task.
    pub fn start_sweeper(&self, interval: Duration) -> SweeperHandle {
        let store = Arc::clone(&self.store);
        let ttl = self.config.answer_timeout;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = store.expire_overdue(ttl).await;
                        if !expired.is_empty() {
                            warn!("Sweeper expired {} abandoned queries", expired.len());
                            telemetry::add_metric("queries_swept", expired.len() as f64, &[]);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx }
    }
}

/// Handle controlling the background expiry sweeper
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: oneshot::Sender<()>,
}

impl SweeperHandle {
    /// Stop the sweeper task
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::human_input::types::QueryState;
    use tokio::time::sleep;

    fn short_config() -> ControllerConfig {
        ControllerConfig {
            answer_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_submit_answer_wakes_waiting_invocation() {
        let controller = Arc::new(QueryLifecycleController::local(ControllerConfig::default()));
        let id = controller
            .submit_query(QueryRequest::new("What is 2+2?"))
            .await;

        let wait_task = tokio::spawn({
            let controller = Arc::clone(&controller);
            let id = id.clone();
            async move { controller.await_answer(&id).await }
        });
        sleep(Duration::from_millis(50)).await;

        controller.submit_answer(&id, "4").await.unwrap();

        let outcome = wait_task.await.unwrap().unwrap();
        assert_eq!(outcome, AwaitOutcome::Answered("4".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_answer_rejected() {
        let controller = QueryLifecycleController::local(short_config());
        let id = controller.submit_query(QueryRequest::new("hello?")).await;

        let outcome = controller.await_answer(&id).await.unwrap();
        assert_eq!(outcome, AwaitOutcome::TimedOut);

        assert!(matches!(
            controller.submit_answer(&id, "too late").await,
            Err(Error::AlreadyResolved)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_answer_rejected() {
        let controller = QueryLifecycleController::local(ControllerConfig::default());
        let id = controller.submit_query(QueryRequest::new("once")).await;

        controller.submit_answer(&id, "first").await.unwrap();
        assert!(matches!(
            controller.submit_answer(&id, "second").await,
            Err(Error::AlreadyResolved)
        ));

        let query = controller.get_query(&id).await.unwrap();
        assert_eq!(query.answer.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_pending_listing_excludes_resolved() {
        let controller = QueryLifecycleController::local(ControllerConfig::default());
        let id = controller.submit_query(QueryRequest::new("visible?")).await;

        let pending = controller.list_pending_queries().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].query_id, id);

        controller.submit_answer(&id, "done").await.unwrap();
        assert!(controller.list_pending_queries().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_expires_abandoned_queries() {
        // Real time: query age is wall-clock based.
        let controller = QueryLifecycleController::local(short_config());
        let id = controller.submit_query(QueryRequest::new("abandoned")).await;

        let sweeper = controller.start_sweeper(Duration::from_millis(100));

        // Give the query time to age past the 200ms timeout and the sweeper
        // time to notice.
        sleep(Duration::from_millis(500)).await;

        let query = controller.get_query(&id).await.unwrap();
        assert_eq!(query.state, QueryState::Expired);
        sweeper.stop();
    }
}
