use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::human_input::types::{HumanQuery, QueryRequest, QueryState, QueryStats};

/// In-memory registry of human queries and their lifecycle state.
///
/// The store is the single source of truth for resolution: the atomic
/// `Pending -> Answered` and `Pending -> Expired` transitions adjudicate the
/// race between an arriving answer and an elapsing timeout. All mutating
/// operations on one id are serialized through the internal lock, so two
/// concurrent resolution attempts produce exactly one winner; the loser
/// observes [`Error::AlreadyResolved`].
///
/// Resolved entries are retained for process lifetime so the poll endpoint
/// and health counts can still see them. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct QueryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, StoredQuery>,
    next_seq: u64,
}

#[derive(Debug)]
struct StoredQuery {
    query: HumanQuery,
    /// Insertion counter, used to keep pending listings in creation order
    seq: u64,
}

impl QueryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending query and return it.
    ///
    /// Ids are freshly generated UUIDs and never reused.
    #[instrument(skip(self, request), fields(question = %request.question))]
    pub async fn create(&self, request: QueryRequest) -> HumanQuery {
        let query = HumanQuery::new(request);

        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            query.id.clone(),
            StoredQuery {
                query: query.clone(),
                seq,
            },
        );

        debug!("Registered query {}", query.id);
        query
    }

    /// Look up a query by id
    pub async fn get(&self, id: &str) -> Result<HumanQuery> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(id)
            .map(|stored| stored.query.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// All queries still waiting for an answer, in creation order
    pub async fn list_pending(&self) -> Vec<HumanQuery> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<&StoredQuery> = inner
            .entries
            .values()
            .filter(|stored| stored.query.state == QueryState::Pending)
            .collect();
        pending.sort_by_key(|stored| stored.seq);
        pending.iter().map(|stored| stored.query.clone()).collect()
    }

    /// Atomically transition a query from `Pending` to `Answered`, recording
    /// the answer text.
    ///
    /// Returns the resolved query so the caller can read its callback
    /// target. Fails with [`Error::AlreadyResolved`] if the query already
    /// reached a terminal state; the rejection is idempotent, not a fault.
    #[instrument(skip(self, answer))]
    pub async fn mark_answered(&self, id: &str, answer: impl Into<String>) -> Result<HumanQuery> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if stored.query.state != QueryState::Pending {
            debug!("Rejecting answer for resolved query {}", id);
            return Err(Error::AlreadyResolved);
        }

        stored.query.state = QueryState::Answered;
        stored.query.answer = Some(answer.into());
        debug!("Query {} answered", id);
        Ok(stored.query.clone())
    }

    /// Atomically transition a query from `Pending` to `Expired`.
    ///
    /// Same contract as [`QueryStore::mark_answered`]: exactly one of two
    /// racing resolution attempts wins.
    #[instrument(skip(self))]
    pub async fn mark_expired(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if stored.query.state != QueryState::Pending {
            debug!("Rejecting expiry for resolved query {}", id);
            return Err(Error::AlreadyResolved);
        }

        stored.query.state = QueryState::Expired;
        debug!("Query {} expired", id);
        Ok(())
    }

    /// Expire every pending query older than `ttl` and return the affected
    /// ids. Used by the background sweeper to resolve queries whose waiter
    /// was cancelled before its own timeout could fire.
    pub async fn expire_overdue(&self, ttl: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let mut expired = Vec::new();

        for stored in inner.entries.values_mut() {
            if stored.query.state == QueryState::Pending && stored.query.age(now) > ttl {
                stored.query.state = QueryState::Expired;
                expired.push(stored.query.id.clone());
            }
        }

        if !expired.is_empty() {
            debug!("Expired {} overdue queries", expired.len());
        }
        expired
    }

    /// Counts of queries per state
    pub async fn stats(&self) -> QueryStats {
        let inner = self.inner.lock().await;
        let mut stats = QueryStats::default();
        for stored in inner.entries.values() {
            match stored.query.state {
                QueryState::Pending => stats.pending += 1,
                QueryState::Answered => stats.answered += 1,
                QueryState::Expired => stats.expired += 1,
            }
        }
        stats
    }
}
