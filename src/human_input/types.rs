use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle state of a human query.
///
/// Transitions are monotonic: `Pending -> Answered` or `Pending -> Expired`.
/// Terminal states are final; there is no other transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// Waiting for a human answer
    Pending,
    /// A human answered; the answer text is recorded
    Answered,
    /// The waiting invocation's deadline elapsed first
    Expired,
}

impl QueryState {
    /// Whether this state is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryState::Pending)
    }
}

/// One outstanding request for human input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanQuery {
    /// Unique identifier, generated at creation
    pub id: String,

    /// The question to show to the human
    pub question: String,

    /// Optional context accompanying the question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// URL to notify when the query is answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,

    /// Time the query was created
    pub created_at: DateTime<Utc>,

    /// Current lifecycle state
    pub state: QueryState,

    /// The answer text, set exactly once on transition to `Answered`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl HumanQuery {
    pub(crate) fn new(request: QueryRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: request.question,
            context: request.context,
            callback_url: request.callback_url,
            created_at: Utc::now(),
            state: QueryState::Pending,
            answer: None,
        }
    }

    /// Age of this query relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Parameters for creating a new query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to ask the human
    pub question: String,

    /// Optional context accompanying the question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// URL to notify once the query is answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl QueryRequest {
    /// Create a new query request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            callback_url: None,
        }
    }

    /// Add context to the request
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a callback URL to the request
    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// Projection of a pending query exposed to the human-facing side.
///
/// Internal fields (callback target, state) are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuery {
    /// Query id
    pub query_id: String,

    /// The question to answer
    pub question: String,

    /// Optional context accompanying the question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Time the query was created
    pub created_at: DateTime<Utc>,
}

impl From<&HumanQuery> for PendingQuery {
    fn from(query: &HumanQuery) -> Self {
        Self {
            query_id: query.id.clone(),
            question: query.question.clone(),
            context: query.context.clone(),
            created_at: query.created_at,
        }
    }
}

/// Outcome of waiting for an answer.
///
/// A timeout is a normal result, not an error: the orchestration layer turns
/// it into a graceful "no response received" message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// The human answered before the deadline
    Answered(String),
    /// The deadline elapsed without an answer
    TimedOut,
}

impl AwaitOutcome {
    /// The answer text, if one arrived
    pub fn answer(&self) -> Option<&str> {
        match self {
            AwaitOutcome::Answered(text) => Some(text),
            AwaitOutcome::TimedOut => None,
        }
    }

    /// Whether an answer arrived before the deadline
    pub fn is_answered(&self) -> bool {
        matches!(self, AwaitOutcome::Answered(_))
    }
}

/// Wire payload delivered to a callback target when a query is answered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    /// Id of the answered query
    pub query_id: String,

    /// The answer text
    pub response: String,
}

/// Counts of queries by state, exposed for operational visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Queries still waiting for an answer
    pub pending: usize,
    /// Queries resolved with an answer
    pub answered: usize,
    /// Queries resolved by timeout
    pub expired: usize,
}
