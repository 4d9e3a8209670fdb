use std::fmt;
use std::time::Duration;

/// Errors that can occur when acquiring a permit.
#[derive(Debug, Clone)]
pub enum RateLimiterError {
    /// No tokens became available within the configured wait budget.
    Timeout {
        /// How long the caller waited before giving up.
        waited: Duration,
    },
    /// The caller's cancellation token fired before a permit was granted.
    Canceled,
}

impl fmt::Display for RateLimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterError::Timeout { waited } => {
                write!(f, "rate limit wait budget exceeded after {waited:?}")
            }
            RateLimiterError::Canceled => write!(f, "rate limiter wait was canceled"),
        }
    }
}

impl std::error::Error for RateLimiterError {}
