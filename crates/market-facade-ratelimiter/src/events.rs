//! Events emitted by the rate limiter.

use std::time::{Duration, Instant};
use market_facade_core::ResilienceEvent;

/// Events emitted by a [`crate::RateLimiter`].
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was acquired, possibly after waiting for tokens to refill.
    PermitAcquired {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: Duration,
        tokens_remaining: f64,
    },

    /// A permit request was rejected because it would exceed the wait budget.
    PermitRejected {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: Duration,
    },

    /// The acquire was canceled before a permit became available.
    PermitCanceled {
        pattern_name: String,
        timestamp: Instant,
    },

    /// The configured rate was changed at runtime.
    RateChanged {
        pattern_name: String,
        timestamp: Instant,
        max_tokens: f64,
        refill_rate: f64,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PermitAcquired { .. } => "permit_acquired",
            Self::PermitRejected { .. } => "permit_rejected",
            Self::PermitCanceled { .. } => "permit_canceled",
            Self::RateChanged { .. } => "rate_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::PermitAcquired { timestamp, .. }
            | Self::PermitRejected { timestamp, .. }
            | Self::PermitCanceled { timestamp, .. }
            | Self::RateChanged { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::PermitAcquired { pattern_name, .. }
            | Self::PermitRejected { pattern_name, .. }
            | Self::PermitCanceled { pattern_name, .. }
            | Self::RateChanged { pattern_name, .. } => pattern_name,
        }
    }
}
