//! The top-level stream manager: one [`crate::VenueConnection`] per
//! registered venue, a subscription table, and the uniform `subscribe`
//! entrypoint.

use crate::adapter::VenueStreamAdapter;
use crate::config::StreamConfig;
use crate::connection::VenueConnection;
use crate::error::StreamError;
use crate::frame::MarketEvent;
use market_facade_types::CanonicalSymbol;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

/// Owns one WebSocket connection per registered venue and the subscription
/// table for all of them.
///
/// Lock order, when both are needed: the connections map, then a
/// connection's own internal subscription lock — mirrors
/// `market_facade_registry::VenueRegistry`'s convention of never holding a
/// collection lock across an `.await`.
pub struct StreamManager {
    config: StreamConfig,
    connections: RwLock<HashMap<String, Arc<VenueConnection>>>,
}

impl StreamManager {
    pub fn builder() -> crate::config::StreamConfigBuilder {
        crate::config::StreamConfigBuilder::new()
    }

    pub(crate) fn from_config(config: StreamConfig) -> Self {
        Self { config, connections: RwLock::new(HashMap::new()) }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Registers a venue's transport. Its connection stays `Disconnected`
    /// until the first `subscribe` call for that venue.
    pub async fn register(&self, adapter: Arc<dyn VenueStreamAdapter>) {
        let venue = adapter.venue().to_string();
        let connection = VenueConnection::new(
            adapter,
            self.config.backoff,
            self.config.read_deadline,
            self.config.ping_interval,
            self.config.subscribe_confirm_timeout,
            self.config.delivery_buffer,
            self.config.event_listeners.clone(),
        );
        self.connections.write().await.insert(venue, connection);
    }

    /// Ensures `(venue, channel, symbol)` is subscribed, connecting and
    /// replaying prior subscriptions as needed, and returns its delivery
    /// channel. Calling this again for an already-subscribed tuple returns a
    /// fresh receiver on the same underlying channel rather than opening a
    /// second subscription.
    pub async fn subscribe(
        &self,
        ctx: CancellationToken,
        venue: &str,
        channel: &str,
        symbol: CanonicalSymbol,
    ) -> Result<broadcast::Receiver<MarketEvent>, StreamError> {
        let connection = {
            let connections = self.connections.read().await;
            connections.get(venue).cloned()
        }
        .ok_or_else(|| StreamError::UnknownVenue(venue.to_string()))?;

        connection.subscribe(ctx, channel, symbol).await
    }

    /// Removes a subscription. If it was the last one on that venue's
    /// connection, the connection is torn down.
    pub async fn unsubscribe(&self, venue: &str, channel: &str, symbol: &CanonicalSymbol) {
        let connection = {
            let connections = self.connections.read().await;
            connections.get(venue).cloned()
        };
        if let Some(connection) = connection {
            if connection.unsubscribe(channel, symbol) {
                connection.shutdown();
            }
        }
    }

    /// Tears down every venue connection. Best-effort; aborts supervisor
    /// tasks rather than waiting for a clean close.
    pub async fn shutdown(&self) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            connection.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StreamFrame;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Fails `connect` a fixed number of times before succeeding, and
    /// auto-acknowledges every subscribe the next time `read_frame` is
    /// polled (one frame per subscribe, in FIFO order).
    struct MockAdapter {
        venue: String,
        connect_failures_remaining: AtomicU32,
        connect_calls: AtomicUsize,
        pending_acks: StdMutex<Vec<(String, String)>>,
    }

    impl MockAdapter {
        fn new(venue: &str, connect_failures: u32) -> Arc<Self> {
            Arc::new(Self {
                venue: venue.to_string(),
                connect_failures_remaining: AtomicU32::new(connect_failures),
                connect_calls: AtomicUsize::new(0),
                pending_acks: StdMutex::new(Vec::new()),
            })
        }
    }

    impl VenueStreamAdapter for MockAdapter {
        fn venue(&self) -> &str {
            &self.venue
        }

        fn connect(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.connect_failures_remaining.load(Ordering::SeqCst) > 0 {
                    self.connect_failures_remaining.fetch_sub(1, Ordering::SeqCst);
                    Err(StreamError::HandshakeFailed {
                        venue: self.venue.clone(),
                        message: "scripted failure".into(),
                    })
                } else {
                    Ok(())
                }
            })
        }

        fn disconnect(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>> {
            Box::pin(async { Ok(()) })
        }

        fn send_subscribe(
            &self,
            _ctx: CancellationToken,
            correlation_id: &str,
            channel: &str,
            _symbol: &CanonicalSymbol,
        ) -> BoxFuture<'_, Result<(), StreamError>> {
            self.pending_acks.lock().unwrap().push((correlation_id.to_string(), channel.to_string()));
            Box::pin(async { Ok(()) })
        }

        fn send_ping(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), StreamError>> {
            Box::pin(async { Ok(()) })
        }

        fn read_frame(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<StreamFrame, StreamError>> {
            let pending = self.pending_acks.lock().unwrap().pop();
            Box::pin(async move {
                match pending {
                    Some((correlation_id, channel_id)) => {
                        Ok(StreamFrame::SubscribeAck { correlation_id, channel_id })
                    }
                    None => std::future::pending().await,
                }
            })
        }
    }

    #[tokio::test]
    async fn unknown_venue_is_an_error() {
        let manager = StreamManager::builder().build();
        let symbol = CanonicalSymbol::parse("BTC-USD").unwrap();
        let err = manager
            .subscribe(CancellationToken::new(), "nope", "trades", symbol)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::UnknownVenue(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_connects_and_confirms() {
        let manager = StreamManager::builder()
            .subscribe_confirm_timeout(Duration::from_secs(5))
            .build();
        manager.register(MockAdapter::new("binance", 0)).await;

        let symbol = CanonicalSymbol::parse("BTC-USD").unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            manager.subscribe(CancellationToken::new(), "binance", "trades", symbol),
        )
        .await
        .expect("subscribe did not complete");

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_subscribe_reuses_existing_channel() {
        let manager = StreamManager::builder().build();
        manager.register(MockAdapter::new("binance", 0)).await;
        let symbol = CanonicalSymbol::parse("BTC-USD").unwrap();

        let _first = tokio::time::timeout(
            Duration::from_secs(10),
            manager.subscribe(CancellationToken::new(), "binance", "trades", symbol.clone()),
        )
        .await
        .unwrap()
        .unwrap();

        let second = tokio::time::timeout(
            Duration::from_secs(10),
            manager.subscribe(CancellationToken::new(), "binance", "trades", symbol),
        )
        .await
        .unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_survives_handshake_failures_via_backoff_retry() {
        let manager = StreamManager::builder()
            .backoff(Duration::from_millis(1), Duration::from_millis(10))
            .build();
        let adapter = MockAdapter::new("binance", 2);
        let connect_calls = Arc::clone(&adapter);
        manager.register(adapter).await;

        let symbol = CanonicalSymbol::parse("BTC-USD").unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            manager.subscribe(CancellationToken::new(), "binance", "trades", symbol),
        )
        .await
        .expect("subscribe did not complete despite paused-clock auto-advance");

        assert!(result.is_ok());
        assert_eq!(connect_calls.connect_calls.load(Ordering::SeqCst), 3);
    }
}
