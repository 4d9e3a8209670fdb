//! WebSocket connection lifecycle and subscription management for venue
//! streaming feeds.
//!
//! [`StreamManager`] guarantees at most one live WebSocket subscription per
//! `(venue, channel, symbol)` and an in-order delivery sequence to
//! consumers. Each registered venue gets its own connection supervisor:
//! connect, subscribe, read, ping, and — on any failure — reconnect with
//! exponential backoff, replaying every subscription on that venue in the
//! order it was first requested.
//!
//! # Example
//!
//! ```no_run
//! use market_facade_stream::StreamManager;
//! use market_facade_types::CanonicalSymbol;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(manager: StreamManager, adapter: std::sync::Arc<dyn market_facade_stream::VenueStreamAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//! manager.register(adapter).await;
//!
//! let ctx = CancellationToken::new();
//! let mut rx = manager
//!     .subscribe(ctx, "binance", "trades", CanonicalSymbol::parse("BTC-USD")?)
//!     .await?;
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod connection;
mod error;
mod events;
mod frame;
mod manager;
mod state;

pub use adapter::VenueStreamAdapter;
pub use config::{StreamConfig, StreamConfigBuilder};
pub use error::StreamError;
pub use events::StreamEvent;
pub use frame::{MarketEvent, StreamFrame};
pub use manager::StreamManager;
pub use state::{BackoffPolicy, ConnectionState};
