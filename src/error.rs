use thiserror::Error;

/// Contract violations raised by the review scheduler core.
///
/// None of these are transient: the core is pure, so retrying a failed call
/// with the same inputs reproduces the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("invalid review policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid review outcome: {0}")]
    InvalidOutcome(String),

    #[error("invalid scheduler state: {0}")]
    InvalidState(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("topic not found: {0}")]
    TopicNotFound(i64),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("review state for topic {topic_id} was modified concurrently")]
    Conflict { topic_id: i64 },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
