use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Maximum retries ({0}) exceeded: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::MaxRetriesExceeded(attempts, _) => *attempts,
        }
    }

    /// Message of the last failed attempt
    pub fn last_error(&self) -> &str {
        match self {
            RetryError::MaxRetriesExceeded(_, msg) => msg,
        }
    }
}
