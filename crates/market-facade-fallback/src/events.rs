//! Events emitted by the fallback chain.

use market_facade_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`crate::FallbackChain`].
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// A venue attempt succeeded; no further venues were tried.
    Served {
        pattern_name: String,
        venue: String,
        attempt_index: usize,
        timestamp: Instant,
    },

    /// A venue attempt failed; the chain proceeds to the next one.
    AttemptFailed {
        pattern_name: String,
        venue: String,
        timestamp: Instant,
    },

    /// Every venue in the chain failed.
    AllFailed {
        pattern_name: String,
        attempted: usize,
        timestamp: Instant,
    },

    /// `reorder()` produced a new venue ordering.
    Reordered {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Served { .. } => "served",
            Self::AttemptFailed { .. } => "attempt_failed",
            Self::AllFailed { .. } => "all_failed",
            Self::Reordered { .. } => "reordered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Served { timestamp, .. }
            | Self::AttemptFailed { timestamp, .. }
            | Self::AllFailed { timestamp, .. }
            | Self::Reordered { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Served { pattern_name, .. }
            | Self::AttemptFailed { pattern_name, .. }
            | Self::AllFailed { pattern_name, .. }
            | Self::Reordered { pattern_name, .. } => pattern_name,
        }
    }
}
