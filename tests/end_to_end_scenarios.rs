//! End-to-end scenarios exercising `MarketFacade` against mock venue
//! adapters: cache effectiveness, circuit breaker open/half-open/close,
//! health-aware fallback skipping a still-healthy venue, rate-limiter burst
//! behavior, and multi-venue fan-out under partial failure.
//!
//! Subscription deduplication (re-subscribing to an already-live
//! `(venue, channel, symbol)` reuses the existing broadcast channel instead
//! of opening a second connection) is exercised at the `market-facade-stream`
//! crate's own `manager::tests::repeated_subscribe_reuses_existing_channel`,
//! against a fake `VenueStreamAdapter` transport — not re-derived here.

use futures::future::BoxFuture;
use market_facade::{
    AdapterError, CircuitConfig, FacadeConfig, FacadeError, MarketFacade, VenueAdapter, VenueCacheConfig, VenueConfig, VenueLimits,
};
use market_facade_core::DataType;
use market_facade_types::{CanonicalSymbol, FundingRate, Interval, Kline, OpenInterest, OrderBookSnapshot, PriceLevel, Provenance, Trade};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A venue adapter whose order-book responses can be scripted call-by-call:
/// the first `fail_calls` calls return an error, every call after that
/// succeeds. Used to drive the circuit breaker through open/half-open/closed
/// and to observe exactly which venues a fallback chain actually invoked.
struct ScriptedAdapter {
    name: &'static str,
    data_types: Vec<DataType>,
    fail_calls: u32,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    fn new(name: &'static str, data_types: Vec<DataType>, fail_calls: u32) -> Self {
        Self { name, data_types, fail_calls, calls: AtomicU32::new(0) }
    }

    fn always_ok(name: &'static str, data_types: Vec<DataType>) -> Self {
        Self::new(name, data_types, 0)
    }

    fn book(&self, symbol: &CanonicalSymbol) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            self.name,
            symbol.clone(),
            chrono::Utc::now(),
            vec![PriceLevel::new(Decimal::new(100, 0), Decimal::new(1, 0))],
            vec![PriceLevel::new(Decimal::new(101, 0), Decimal::new(1, 0))],
            None,
            Provenance::live(self.name, chrono::Utc::now()),
        )
        .unwrap()
    }
}

impl VenueAdapter for ScriptedAdapter {
    fn venue(&self) -> &str {
        self.name
    }

    fn supports(&self, data_type: DataType) -> bool {
        self.data_types.contains(&data_type)
    }

    fn start(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move { Ok(()) })
    }

    fn stop(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move { Ok(()) })
    }

    fn health_check(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move { Ok(()) })
    }

    fn get_order_book(
        &self,
        _ctx: CancellationToken,
        symbol: &CanonicalSymbol,
        _depth: u32,
    ) -> BoxFuture<'_, Result<OrderBookSnapshot, AdapterError>> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if call_index < self.fail_calls { Err(AdapterError::msg("upstream 500")) } else { Ok(self.book(symbol)) };
        Box::pin(async move { result })
    }

    fn get_trades(
        &self,
        _ctx: CancellationToken,
        _symbol: &CanonicalSymbol,
        _limit: u32,
    ) -> BoxFuture<'_, Result<Vec<Trade>, AdapterError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn get_klines(
        &self,
        _ctx: CancellationToken,
        _symbol: &CanonicalSymbol,
        _interval: Interval,
        _limit: u32,
    ) -> BoxFuture<'_, Result<Vec<Kline>, AdapterError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn get_funding(
        &self,
        _ctx: CancellationToken,
        _symbol: &CanonicalSymbol,
    ) -> BoxFuture<'_, Result<FundingRate, AdapterError>> {
        Box::pin(async move { Err(AdapterError::msg("unimplemented")) })
    }

    fn get_open_interest(
        &self,
        _ctx: CancellationToken,
        _symbol: &CanonicalSymbol,
    ) -> BoxFuture<'_, Result<OpenInterest, AdapterError>> {
        Box::pin(async move { Err(AdapterError::msg("unimplemented")) })
    }

    fn get_limits(&self) -> VenueLimits {
        VenueLimits {
            requests_per_second: 1000.0,
            burst: 1000,
            timeout: Duration::from_secs(1),
            max_retries: 0,
        }
    }
}

fn fast_limits() -> (f64, u32, Duration) {
    (1000.0, 1000, Duration::from_secs(1))
}

fn venue_config_with_circuit(circuit: CircuitConfig) -> VenueConfig {
    let (rps, burst, timeout) = fast_limits();
    VenueConfig { rate_limit_rps: rps, burst, request_timeout: timeout, circuit, ..VenueConfig::default() }
}

/// Cache effectiveness: a second call for the same venue/symbol/params
/// within the TTL is served from cache, not the adapter.
#[tokio::test]
async fn cache_effectiveness() {
    let facade = MarketFacade::new(FacadeConfig::default());
    let adapter = Arc::new(ScriptedAdapter::always_ok("binance", vec![DataType::OrderBook]));
    facade.register_venue(adapter.clone(), None, venue_config_with_circuit(CircuitConfig::default())).await.unwrap();

    let ctx = CancellationToken::new();
    for _ in 0..5 {
        facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await.unwrap();
    }

    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1, "cache should absorb repeat calls within the TTL");
}

/// Circuit breaker opens after the configured failure rate over the
/// minimum sample size, rejects immediately while open, then recovers
/// through half-open once `open_timeout` elapses and a call succeeds.
#[tokio::test]
async fn circuit_breaker_opens_and_recovers() {
    let circuit = CircuitConfig {
        enabled: true,
        failure_threshold: 0.5,
        min_requests: 2,
        open_timeout: Duration::from_millis(50),
        ..CircuitConfig::default()
    };
    let config = VenueConfig { cache: VenueCacheConfig { enabled: false, ..VenueCacheConfig::default() }, ..venue_config_with_circuit(circuit) };

    let facade = MarketFacade::new(FacadeConfig::default());
    let adapter = Arc::new(ScriptedAdapter::new("binance", vec![DataType::OrderBook], 2));
    facade.register_venue(adapter.clone(), None, config).await.unwrap();

    let ctx = CancellationToken::new();
    let first = facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await;
    let second = facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await;
    assert!(first.is_err());
    assert!(second.is_err());

    let rejected = facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await;
    assert!(matches!(rejected, Err(FacadeError::CircuitOpen { .. })), "breaker should reject without calling the adapter");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2, "the open-circuit rejection must not reach the adapter");

    tokio::time::sleep(Duration::from_millis(80)).await;

    let recovered = facade.get_order_book(ctx, "binance", "BTC-USD", 10).await;
    assert!(recovered.is_ok(), "a probe call after open_timeout should succeed and close the circuit");
}

/// A fallback chain skips a failing venue and a still-healthy one it never
/// needed to reach.
#[tokio::test]
async fn fallback_skips_failing_venue_and_never_calls_the_untouched_one() {
    let facade = MarketFacade::new(FacadeConfig::default());
    let venue_a = Arc::new(ScriptedAdapter::new("venue_a", vec![DataType::OrderBook], u32::MAX));
    let venue_b = Arc::new(ScriptedAdapter::always_ok("venue_b", vec![DataType::OrderBook]));
    let venue_c = Arc::new(ScriptedAdapter::always_ok("venue_c", vec![DataType::OrderBook]));

    facade.register_venue(venue_a.clone(), None, venue_config_with_circuit(CircuitConfig::default())).await.unwrap();
    facade.register_venue(venue_b.clone(), None, venue_config_with_circuit(CircuitConfig::default())).await.unwrap();
    facade.register_venue(venue_c.clone(), None, venue_config_with_circuit(CircuitConfig::default())).await.unwrap();

    let result = facade.get_order_book_with_fallback(CancellationToken::new(), "BTC-USD", 10).await.unwrap();

    assert_eq!(result.served_by, "venue_b");
    assert!(venue_a.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(venue_c.calls.load(Ordering::SeqCst), 0, "a venue later in the chain than the one that served should never be called");
}

/// A burst of calls beyond the token bucket's capacity sees at least one
/// rate-limited rejection; calls within the burst succeed.
#[tokio::test]
async fn rate_limiter_rejects_beyond_burst() {
    let config = VenueConfig {
        rate_limit_rps: 1.0,
        burst: 2,
        request_timeout: Duration::from_millis(1),
        cache: VenueCacheConfig { enabled: false, ..VenueCacheConfig::default() },
        ..VenueConfig::default()
    };

    let facade = MarketFacade::new(FacadeConfig::default());
    let adapter = Arc::new(ScriptedAdapter::always_ok("binance", vec![DataType::OrderBook]));
    facade.register_venue(adapter, None, config).await.unwrap();

    let ctx = CancellationToken::new();
    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await);
    }

    assert!(outcomes.iter().any(|r| r.is_ok()), "calls within burst capacity should succeed");
    assert!(
        outcomes.iter().any(|r| matches!(r, Err(FacadeError::RateLimited { .. }))),
        "calls beyond burst capacity plus refill should be rate limited"
    );
}

/// Multi-venue fan-out collects every venue's outcome rather than failing
/// the whole call when one venue errors.
#[tokio::test]
async fn multi_venue_fan_out_reports_each_venue_independently() {
    let facade = MarketFacade::new(FacadeConfig::default());
    facade
        .register_venue(
            Arc::new(ScriptedAdapter::always_ok("binance", vec![DataType::OrderBook])),
            None,
            venue_config_with_circuit(CircuitConfig::default()),
        )
        .await
        .unwrap();
    facade
        .register_venue(
            Arc::new(ScriptedAdapter::new("kraken", vec![DataType::OrderBook], u32::MAX)),
            None,
            venue_config_with_circuit(CircuitConfig::default()),
        )
        .await
        .unwrap();

    let results = facade
        .get_order_book_multi_venue(CancellationToken::new(), vec!["binance".to_string(), "kraken".to_string()], "BTC-USD", 10)
        .await;

    assert!(results["binance"].is_ok());
    assert!(results["kraken"].is_err());
}

/// A venue's circuit tripping open reorders the fallback chain immediately
/// (not just on the next health-check sweep): once open, that venue drops
/// behind a still-closed one, so a subsequent fallback fetch never reaches
/// it at all instead of trying and skipping it on every call.
#[tokio::test]
async fn fallback_reorders_after_circuit_opens_and_prefers_healthier_venue() {
    let circuit = CircuitConfig { enabled: true, failure_threshold: 0.5, min_requests: 2, open_timeout: Duration::from_secs(30), ..CircuitConfig::default() };
    let flaky_config = VenueConfig { cache: VenueCacheConfig { enabled: false, ..VenueCacheConfig::default() }, ..venue_config_with_circuit(circuit) };

    let facade = MarketFacade::new(FacadeConfig::default());
    let venue_a = Arc::new(ScriptedAdapter::new("venue_a", vec![DataType::OrderBook], u32::MAX));
    let venue_b = Arc::new(ScriptedAdapter::always_ok("venue_b", vec![DataType::OrderBook]));

    facade.register_venue(venue_a.clone(), None, flaky_config).await.unwrap();
    facade.register_venue(venue_b.clone(), None, venue_config_with_circuit(CircuitConfig::default())).await.unwrap();

    let ctx = CancellationToken::new();

    // venue_a is first in the chain by registration order, so it's tried
    // (and fails) before the fallback falls through to venue_b.
    let before = facade.get_order_book_with_fallback(ctx.clone(), "BTC-USD", 10).await.unwrap();
    assert_eq!(before.served_by, "venue_b");
    assert_eq!(venue_a.calls.load(Ordering::SeqCst), 1, "venue_a is still ahead in the chain before its circuit opens");

    // Trip venue_a's circuit directly, independent of the fallback chain, so
    // the exact call count that opens it is known.
    let _ = facade.get_order_book(ctx.clone(), "venue_a", "BTC-USD", 10).await;
    let _ = facade.get_order_book(ctx.clone(), "venue_a", "BTC-USD", 10).await;
    let opened = facade.get_order_book(ctx.clone(), "venue_a", "BTC-USD", 10).await;
    assert!(matches!(opened, Err(FacadeError::CircuitOpen { .. })), "two failures at min_requests=2 should open the breaker");

    let calls_once_open = venue_a.calls.load(Ordering::SeqCst);

    let after = facade.get_order_book_with_fallback(ctx, "BTC-USD", 10).await.unwrap();
    assert_eq!(after.served_by, "venue_b");
    assert_eq!(
        venue_a.calls.load(Ordering::SeqCst),
        calls_once_open,
        "a reordered chain puts the already-healthy venue first, so venue_a is never called again"
    );
}
