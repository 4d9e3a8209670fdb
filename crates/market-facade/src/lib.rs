//! Multi-venue cryptocurrency market-data facade.
//!
//! `MarketFacade` is the single entry point a caller builds: register each
//! venue's REST and (optionally) streaming adapter, then fetch order books,
//! trades, klines, funding rates and open interest through one consistent,
//! cached, rate-limited, circuit-broken pipeline — with health-aware
//! fallback across venues and bounded-concurrency multi-venue fan-out where
//! the caller wants every venue's view at once.
//!
//! ```no_run
//! use market_facade::{FacadeConfig, MarketFacade, VenueConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(adapter: std::sync::Arc<dyn market_facade::VenueAdapter>) -> Result<(), market_facade::FacadeError> {
//! let facade = MarketFacade::new(FacadeConfig::default());
//! facade.register_venue(adapter, None, VenueConfig::default()).await?;
//! facade.start(CancellationToken::new()).await?;
//!
//! let book = facade.get_order_book(CancellationToken::new(), "binance", "BTC-USD", 50).await?;
//! # let _ = book;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod facade;
mod snapshot;
mod venue;

pub use config::{CircuitConfig, FacadeConfig, NamedVenueConfig, VenueCacheConfig, VenueConfig};
pub use error::{BoxError, FacadeError};
pub use facade::{CacheMetrics, MarketFacade};
pub use snapshot::{Snapshot, SnapshotKey, SnapshotStore};
pub use venue::CachedValue;

// Re-exported so callers can build adapters, register venues and read
// health/error types without depending on the pattern crates directly.
pub use market_facade_fallback::{FallbackResult, ScoreInputs};
pub use market_facade_registry::{AdapterError, HealthRecord, HealthStatus, RegistryError, VenueAdapter, VenueLimits};
pub use market_facade_stream::{MarketEvent, StreamError, VenueStreamAdapter};
