use thiserror::Error;

/// A specialized Result type for human-loop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that can occur while managing human queries.
///
/// `NotFound` and `AlreadyResolved` are the store's typed rejections: a lost
/// race is reported to the caller as a recoverable result, never as a panic
/// or an abort of the winning path. A timed-out wait is not an error at all;
/// it is surfaced as [`crate::human_input::AwaitOutcome::TimedOut`].
#[derive(Debug, Error)]
pub enum Error {
    /// Operation referenced an unknown query id
    #[error("query not found: {0}")]
    NotFound(String),

    /// The query already reached a terminal state (answered or expired)
    #[error("query already answered or expired")]
    AlreadyResolved,

    /// Callback notification could not be delivered to the waiting side
    #[error("callback delivery failed: {0}")]
    DeliveryFailed(String),

    /// The callback target is not a usable address
    #[error("invalid callback target: {0}")]
    InvalidTarget(String),

    /// The response channel closed before an answer or timeout arrived
    #[error("response channel closed")]
    ChannelClosed,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input from a caller or operator
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal errors with custom messages
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error during read/write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
