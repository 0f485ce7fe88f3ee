//! Client-side refresh error types

use std::time::Duration;
use thiserror::Error;

/// Result of a single refresh attempt, as reported by a `SessionRefresher`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The server definitively rejected the session (HTTP 401)
    #[error("Session is no longer valid")]
    SessionInvalid,

    /// Network failure, timeout or unexpected status; retried on the next tick
    #[error("Transient refresh failure: {0}")]
    Transient(String),
}

/// Scheduler lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    /// Timer tasks did not finish after cancellation
    #[error("Timer tasks did not stop within {0:?}")]
    JoinTimeout(Duration),

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
