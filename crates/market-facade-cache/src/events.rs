//! Events emitted by the cache.

use market_facade_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`crate::Cache`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A lookup found a live (non-expired) entry.
    Hit {
        pattern_name: String,
        timestamp: Instant,
    },

    /// A lookup found no entry, or the entry had expired past its stale
    /// window.
    Miss {
        pattern_name: String,
        timestamp: Instant,
    },

    /// A lookup found an entry past `expires_at` but still within the
    /// configured stale window; the stale value was returned and a
    /// background refresh was triggered (or was already in flight).
    StaleServed {
        pattern_name: String,
        timestamp: Instant,
    },

    /// An entry was evicted to make room for a new one, or removed by the
    /// background sweeper.
    Eviction {
        pattern_name: String,
        timestamp: Instant,
    },

    /// A background refresh completed and failed; the stale value already
    /// served to callers was not replaced.
    RefreshFailed {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Miss { .. } => "miss",
            Self::StaleServed { .. } => "stale_served",
            Self::Eviction { .. } => "eviction",
            Self::RefreshFailed { .. } => "refresh_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Hit { timestamp, .. }
            | Self::Miss { timestamp, .. }
            | Self::StaleServed { timestamp, .. }
            | Self::Eviction { timestamp, .. }
            | Self::RefreshFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Hit { pattern_name, .. }
            | Self::Miss { pattern_name, .. }
            | Self::StaleServed { pattern_name, .. }
            | Self::Eviction { pattern_name, .. }
            | Self::RefreshFailed { pattern_name, .. } => pattern_name,
        }
    }
}
