//! The per-venue WebSocket transport contract.
//!
//! [`crate::StreamManager`] owns the connection lifecycle (backoff,
//! reconnect, subscription replay); a `VenueStreamAdapter` only knows how to
//! speak one venue's wire protocol over whatever socket it holds. Mirrors
//! `market_facade_registry::VenueAdapter`'s split between generic machinery
//! and a venue-specific plug-in point — and the same `BoxFuture` return
//! shape, for the same reason: `Arc<dyn VenueStreamAdapter>` must stay
//! dyn-compatible, which rules out `async fn` in the trait.

use crate::error::StreamError;
use crate::frame::StreamFrame;
use futures::future::BoxFuture;
use market_facade_types::CanonicalSymbol;
use tokio_util::sync::CancellationToken;

/// A venue's WebSocket transport: connect/subscribe/ping/read, nothing more.
pub trait VenueStreamAdapter: Send + Sync {
    fn venue(&self) -> &str;

    /// Establishes the socket and completes the venue's handshake.
    fn connect(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>>;

    /// Tears down the socket. Best-effort; called on reconnect and on
    /// cancellation.
    fn disconnect(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>>;

    /// Writes a subscribe frame for `channel`/`symbol`. `correlation_id`
    /// must be echoed back in the eventual `SubscribeAck`/`SubscribeNack`.
    fn send_subscribe(
        &self,
        ctx: CancellationToken,
        correlation_id: &str,
        channel: &str,
        symbol: &CanonicalSymbol,
    ) -> BoxFuture<'_, Result<(), StreamError>>;

    /// Writes a ping frame.
    fn send_ping(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>>;

    /// Reads and decodes the next frame. Blocks until one arrives; the
    /// caller applies the read deadline via `tokio::time::timeout`.
    fn read_frame(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<StreamFrame, StreamError>>;
}
