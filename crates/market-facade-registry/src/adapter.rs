//! The venue adapter contract.
//!
//! A venue adapter is the per-exchange implementation of this trait —
//! Binance, Kraken, Coinbase, OKX, and so on. Everything below the trait
//! boundary (REST/WS transport, wire JSON shapes, symbol tables) is the
//! adapter's own business; the registry, fallback chain, and facade only
//! ever see the canonical types and this interface.

use crate::error::AdapterError;
use futures::future::BoxFuture;
use market_facade_core::DataType;
use market_facade_types::{CanonicalSymbol, FundingRate, Interval, Kline, OpenInterest, OrderBookSnapshot, Trade};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Rate- and retry-related limits a venue adapter advertises about itself.
///
/// Consumed by the facade to size its rate limiter and circuit breaker per
/// venue; the adapter does not enforce these limits itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenueLimits {
    pub requests_per_second: f64,
    pub burst: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

/// The canonical per-venue contract every exchange integration implements.
///
/// Lifecycle, fetch, and streaming methods all take a [`CancellationToken`]
/// so a caller can abandon an in-flight call; an adapter MUST observe it
/// rather than run to completion regardless.
///
/// Fetch and lifecycle methods return boxed futures rather than using
/// `async fn` directly so that `Arc<dyn VenueAdapter>` remains object-safe —
/// the registry stores a heterogeneous set of concrete adapters behind this
/// one trait.
pub trait VenueAdapter: Send + Sync {
    /// The venue's canonical name, e.g. `"binance"`. Used as the registry key.
    fn venue(&self) -> &str;

    /// Whether this adapter can serve the given kind of data.
    fn supports(&self, data_type: DataType) -> bool;

    /// Establishes whatever long-lived connections or auth the adapter needs
    /// before it can serve calls (idempotent if already started).
    fn start(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>>;

    /// Tears down anything `start` set up.
    fn stop(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>>;

    /// A lightweight liveness probe, invoked periodically by the registry's
    /// supervisor loop. MUST NOT have side effects visible to callers of the
    /// fetch methods.
    fn health_check(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>>;

    fn get_order_book(
        &self,
        ctx: CancellationToken,
        symbol: &CanonicalSymbol,
        depth: u32,
    ) -> BoxFuture<'_, Result<OrderBookSnapshot, AdapterError>>;

    fn get_trades(
        &self,
        ctx: CancellationToken,
        symbol: &CanonicalSymbol,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<Trade>, AdapterError>>;

    fn get_klines(
        &self,
        ctx: CancellationToken,
        symbol: &CanonicalSymbol,
        interval: Interval,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<Kline>, AdapterError>>;

    fn get_funding(
        &self,
        ctx: CancellationToken,
        symbol: &CanonicalSymbol,
    ) -> BoxFuture<'_, Result<FundingRate, AdapterError>>;

    fn get_open_interest(
        &self,
        ctx: CancellationToken,
        symbol: &CanonicalSymbol,
    ) -> BoxFuture<'_, Result<OpenInterest, AdapterError>>;

    /// The limits this adapter advertises for itself. Pure, synchronous.
    fn get_limits(&self) -> VenueLimits;
}
