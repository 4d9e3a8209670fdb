//! Error types for the stream manager.

use thiserror::Error;

/// Errors raised by [`crate::StreamManager`] and venue connections.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unknown venue: {0}")]
    UnknownVenue(String),

    #[error("connect failed for {venue}: {message}")]
    ConnectFailed { venue: String, message: String },

    #[error("handshake failed for {venue}: {message}")]
    HandshakeFailed { venue: String, message: String },

    #[error("subscribe rejected: {0}")]
    SubscribeRejected(String),

    #[error("timed out waiting for subscribe confirmation")]
    SubscribeTimeout,

    #[error("read error: {0}")]
    ReadFailed(String),

    #[error("ping failed: {0}")]
    PingFailed(String),

    #[error("connection closed")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,
}
