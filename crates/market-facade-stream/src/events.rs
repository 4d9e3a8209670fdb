//! Events emitted by the stream manager.

use market_facade_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a venue's connection lifecycle.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Connecting {
        venue: String,
        timestamp: Instant,
    },
    Connected {
        venue: String,
        timestamp: Instant,
    },
    Disconnected {
        venue: String,
        timestamp: Instant,
    },
    HandshakeFailed {
        venue: String,
        timestamp: Instant,
    },
    BackoffScheduled {
        venue: String,
        delay: Duration,
        timestamp: Instant,
    },
    Subscribed {
        venue: String,
        channel: String,
        timestamp: Instant,
    },
    SubscribeFailed {
        venue: String,
        channel: String,
        timestamp: Instant,
    },
    FrameDropped {
        venue: String,
        channel: String,
        timestamp: Instant,
    },
    Closed {
        venue: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for StreamEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Connecting { .. } => "connecting",
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::HandshakeFailed { .. } => "handshake_failed",
            Self::BackoffScheduled { .. } => "backoff_scheduled",
            Self::Subscribed { .. } => "subscribed",
            Self::SubscribeFailed { .. } => "subscribe_failed",
            Self::FrameDropped { .. } => "frame_dropped",
            Self::Closed { .. } => "closed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Connecting { timestamp, .. }
            | Self::Connected { timestamp, .. }
            | Self::Disconnected { timestamp, .. }
            | Self::HandshakeFailed { timestamp, .. }
            | Self::BackoffScheduled { timestamp, .. }
            | Self::Subscribed { timestamp, .. }
            | Self::SubscribeFailed { timestamp, .. }
            | Self::FrameDropped { timestamp, .. }
            | Self::Closed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Connecting { venue, .. }
            | Self::Connected { venue, .. }
            | Self::Disconnected { venue, .. }
            | Self::HandshakeFailed { venue, .. }
            | Self::BackoffScheduled { venue, .. }
            | Self::Subscribed { venue, .. }
            | Self::SubscribeFailed { venue, .. }
            | Self::FrameDropped { venue, .. }
            | Self::Closed { venue, .. } => venue,
        }
    }
}
