use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    /// Optimistic-concurrency collision on a trust record write.
    /// Retried internally, never surfaced to callers.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The external classifier timed out or failed. Recovered locally by
    /// degrading the verdict to review, never surfaced as a failure.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Invalid queue transition: {from} -> {to}")]
    InvalidQueueTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SafetyError {
    /// Whether this error may be returned to the caller as-is.
    /// Everything else is retried or degraded inside the engine.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            SafetyError::Validation(_)
                | SafetyError::NotFound(_)
                | SafetyError::Permission(_)
                | SafetyError::InvalidQueueTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SafetyError>;
