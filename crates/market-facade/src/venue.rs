//! Per-venue runtime: the rate limiter, circuit breaker and cache guarding
//! calls to one adapter, and the pipeline that threads a fetch through them.

use crate::config::VenueConfig;
use crate::error::FacadeError;
use market_facade_cache::Cache;
use market_facade_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use market_facade_ratelimiter::{RateLimiter, RateLimiterError};
use market_facade_registry::{AdapterError, VenueAdapter};
use market_facade_types::{FundingRate, Kline, OpenInterest, OrderBookSnapshot, Provenance, Trade};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Stamps `endpoint` and `latency` onto the provenance of every value
/// carried by `value` — a `Vec`-backed variant like `Trades`/`Klines`
/// carries one `Provenance` per element, since each element is independently
/// traceable back to the call that produced it.
fn stamp_provenance(mut value: CachedValue, endpoint: &str, latency: Duration) -> CachedValue {
    fn stamp_one(p: &mut Provenance, endpoint: &str, latency: Duration) {
        p.endpoint = endpoint.to_string();
        p.latency = Some(latency);
    }

    match &mut value {
        CachedValue::OrderBook(v) => stamp_one(&mut v.provenance, endpoint, latency),
        CachedValue::Trades(v) => v.iter_mut().for_each(|t| stamp_one(&mut t.provenance, endpoint, latency)),
        CachedValue::Klines(v) => v.iter_mut().for_each(|k| stamp_one(&mut k.provenance, endpoint, latency)),
        CachedValue::Funding(v) => stamp_one(&mut v.provenance, endpoint, latency),
        CachedValue::OpenInterest(v) => stamp_one(&mut v.provenance, endpoint, latency),
    }
    value
}

/// Any of the five fetch operations' return types, boxed behind one cache.
///
/// Grounded on the spec's data model §3: one cache entry holds exactly one
/// of these per `(venue, op, symbol[, params])` key.
#[derive(Debug, Clone)]
pub enum CachedValue {
    OrderBook(OrderBookSnapshot),
    Trades(Vec<Trade>),
    Klines(Vec<Kline>),
    Funding(FundingRate),
    OpenInterest(OpenInterest),
}

impl CachedValue {
    pub fn as_order_book(self) -> Option<OrderBookSnapshot> {
        match self {
            Self::OrderBook(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_trades(self) -> Option<Vec<Trade>> {
        match self {
            Self::Trades(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_klines(self) -> Option<Vec<Kline>> {
        match self {
            Self::Klines(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_funding(self) -> Option<FundingRate> {
        match self {
            Self::Funding(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_open_interest(self) -> Option<OpenInterest> {
        match self {
            Self::OpenInterest(v) => Some(v),
            _ => None,
        }
    }
}

/// Default per-operation cache TTLs (spec §4.H: "shorter for trades than
/// for order books; longer for funding").
pub const ORDER_BOOK_TTL: Duration = Duration::from_secs(2);
pub const TRADES_TTL: Duration = Duration::from_millis(500);
pub const KLINES_TTL: Duration = Duration::from_secs(5);
pub const FUNDING_TTL: Duration = Duration::from_secs(30);
pub const OPEN_INTEREST_TTL: Duration = Duration::from_secs(10);

/// The rate limiter, circuit breaker and cache guarding calls to one venue,
/// plus the adapter itself.
///
/// One `VenueRuntime` per registered venue. The rate limiter and circuit
/// breaker are shared (cheaply cloned, same underlying state) by every
/// caller that fetches from this venue, matching spec §3's ownership rule
/// that they're "shared (mutable) by all callers for the venue they guard."
pub(crate) struct VenueRuntime {
    pub(crate) adapter: Arc<dyn VenueAdapter>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) breaker: CircuitBreaker<AdapterError>,
    pub(crate) breaker_enabled: bool,
    pub(crate) cache: Cache<String, CachedValue, PipelineError>,
}

/// Which stage of the pipeline rejected the call, kept distinct through the
/// cache's opaque error channel so the outer mapping to [`FacadeError`] can
/// tell a rate-limit wait timeout and a breaker-open rejection apart from an
/// actual adapter failure, instead of flattening all three into one kind.
#[derive(Debug)]
pub(crate) enum PipelineError {
    RateLimited(RateLimiterError),
    CircuitOpen,
    Adapter(AdapterError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(e) => write!(f, "{e}"),
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::Adapter(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl VenueRuntime {
    /// `on_circuit_transition` is wired by the facade to a shared scorer so a
    /// venue's circuit flipping state is one of the signals that drives
    /// fallback-chain reordering, alongside health-check outcomes.
    pub(crate) fn new<F>(adapter: Arc<dyn VenueAdapter>, config: &VenueConfig, on_circuit_transition: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        let venue = adapter.venue().to_string();

        let rate_limiter = RateLimiter::builder()
            .max_tokens(config.burst as f64)
            .refill_rate(config.rate_limit_rps)
            .wait_timeout(config.request_timeout)
            .name(format!("{venue}-rest"))
            .build();

        let breaker = CircuitBreaker::builder()
            .failure_rate_threshold(config.circuit.failure_threshold)
            .minimum_number_of_calls(config.circuit.min_requests)
            .base_wait_duration_in_open(config.circuit.open_timeout)
            .on_state_transition(on_circuit_transition)
            .name(format!("{venue}-rest"))
            .build::<AdapterError>();

        let cache = Cache::builder()
            .capacity(config.cache.max_entries)
            .default_ttl(config.cache.ttl)
            .stale_window(config.cache.stale_window)
            .enabled(config.cache.enabled)
            .name(format!("{venue}-rest"))
            .build::<String, CachedValue, PipelineError>();

        Self { adapter, rate_limiter, breaker, breaker_enabled: config.circuit.enabled, cache }
    }

    /// Runs `endpoint`'s cached, rate-limited, circuit-broken pipeline.
    ///
    /// `key` is the cache key; `ttl` its entry lifetime; `call` receives the
    /// shared adapter and the caller's cancellation token and performs the
    /// actual wire call. `call` must be `'static` because the cache's
    /// `get_or_refresh` may run it on a detached task when coalescing
    /// concurrent misses onto one in-flight refresh.
    pub(crate) async fn execute<F, Fut>(
        &self,
        endpoint: &str,
        key: String,
        ttl: Duration,
        ctx: CancellationToken,
        call: F,
    ) -> Result<CachedValue, FacadeError>
    where
        F: FnOnce(Arc<dyn VenueAdapter>, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<CachedValue, AdapterError>> + Send + 'static,
    {
        if ctx.is_cancelled() {
            return Err(FacadeError::Canceled);
        }

        let venue = self.adapter.venue().to_string();
        let endpoint = endpoint.to_string();
        let endpoint_for_call = endpoint.clone();
        let adapter = Arc::clone(&self.adapter);
        let rate_limiter = self.rate_limiter.clone();
        let breaker = self.breaker.clone();
        let breaker_enabled = self.breaker_enabled;
        let guarded_ctx = ctx.clone();

        let result = self
            .cache
            .get_or_refresh(key, ttl, move || async move {
                rate_limiter.wait(&guarded_ctx).await.map_err(PipelineError::RateLimited)?;

                let started_at = Instant::now();
                let outcome = if breaker_enabled {
                    breaker.call(call(adapter, guarded_ctx)).await.map_err(|e| match e {
                        CircuitBreakerError::Open => PipelineError::CircuitOpen,
                        CircuitBreakerError::Inner(inner) => PipelineError::Adapter(inner),
                    })
                } else {
                    call(adapter, guarded_ctx).await.map_err(PipelineError::Adapter)
                };
                let latency = started_at.elapsed();

                outcome.map(|value| stamp_provenance(value, &endpoint_for_call, latency))
            })
            .await;

        result.map_err(|e| match e.into_inner() {
            Some(arc_err) => match Arc::try_unwrap(arc_err) {
                Ok(PipelineError::RateLimited(rl_err)) => FacadeError::RateLimited {
                    venue: venue.clone(),
                    endpoint: endpoint.clone(),
                    message: rl_err.to_string(),
                },
                Ok(PipelineError::CircuitOpen) => FacadeError::CircuitOpen { venue: venue.clone(), endpoint: endpoint.clone() },
                Ok(PipelineError::Adapter(adapter_err)) => FacadeError::from_adapter_error(&venue, &endpoint, adapter_err),
                Err(shared) => FacadeError::NetworkError {
                    venue: venue.clone(),
                    endpoint: endpoint.clone(),
                    message: shared.to_string(),
                    cause: None,
                },
            },
            None => FacadeError::NetworkError {
                venue: venue.clone(),
                endpoint: endpoint.clone(),
                message: "in-flight refresh was lost before completing".into(),
                cause: None,
            },
        })
    }
}
