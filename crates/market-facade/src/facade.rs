//! The `MarketFacade`: the single entry point composing the registry,
//! per-venue rate limiter/circuit breaker/cache pipelines, fallback chains,
//! the stream manager and the snapshot store into the operations spec §6
//! names.

use crate::config::{FacadeConfig, VenueConfig};
use crate::error::FacadeError;
use crate::snapshot::{Snapshot, SnapshotKey, SnapshotStore};
use crate::venue::{CachedValue, VenueRuntime, FUNDING_TTL, KLINES_TTL, OPEN_INTEREST_TTL, ORDER_BOOK_TTL, TRADES_TTL};
use market_facade_circuitbreaker::CircuitState;
use market_facade_core::DataType;
use market_facade_fallback::{FallbackChain, FallbackResult, ScoreInputs};
use market_facade_registry::{AdapterError, HealthRecord, RegistryError, VenueAdapter, VenueRegistry};
use market_facade_stream::{MarketEvent, StreamManager, VenueStreamAdapter};
use market_facade_types::{
    CanonicalSymbol, FundingRate, Interval, Kline, OpenInterest, OrderBookSnapshot, Trade,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;
use tokio::sync::{broadcast, Notify, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

/// Latency a venue is scored against as "as slow as it gets" — beyond this,
/// [`ScoreInputs::normalized_latency`] saturates at 1.0. Chosen to be well
/// above a healthy REST round trip but inside a single health-check timeout.
const LATENCY_SCORE_CEILING: Duration = Duration::from_millis(500);

fn score_inputs_from_health(record: &HealthRecord, circuit_closed: bool) -> ScoreInputs {
    let normalized_latency = (record.last_latency.as_secs_f64() / LATENCY_SCORE_CEILING.as_secs_f64()).min(1.0);
    ScoreInputs {
        healthy: record.status.is_healthy(),
        success_rate: record.success_rate(),
        normalized_latency,
        circuit_closed,
    }
}

/// Shared by the registry's `on_health_change` listener and every venue's
/// circuit breaker `on_state_transition` listener: whichever fires, it
/// re-reads that venue's current health and circuit state and pushes a
/// fresh [`ScoreInputs`] into every fallback chain, then reorders them.
type Scorer = Arc<dyn Fn(&str) + Send + Sync>;

fn build_scorer(
    fallback_chains: Arc<FallbackChains>,
    circuit_closed: Arc<StdMutex<HashMap<String, bool>>>,
    registry_cell: Arc<OnceLock<Arc<VenueRegistry>>>,
) -> Scorer {
    Arc::new(move |venue: &str| {
        let Some(registry) = registry_cell.get() else { return };
        let Some(record) = registry.try_health_of(venue) else { return };
        let closed = circuit_closed.lock().expect("circuit_closed lock poisoned").get(venue).copied().unwrap_or(true);
        fallback_chains.update_score(venue, score_inputs_from_health(&record, closed));
        fallback_chains.reorder_all();
    })
}

fn interval_label(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1m",
        Interval::FiveMinutes => "5m",
        Interval::FifteenMinutes => "15m",
        Interval::OneHour => "1h",
        Interval::FourHours => "4h",
        Interval::OneDay => "1d",
    }
}

fn parse_symbol(raw: &str) -> Result<CanonicalSymbol, FacadeError> {
    CanonicalSymbol::parse(raw).map_err(|e| FacadeError::InvalidSymbol { message: e.to_string() })
}

/// Request parameters a snapshot assumes when looking up an already-cached
/// value for a `(venue, data_type, symbol)` triple. `SnapshotKey` carries no
/// depth/limit/interval of its own (spec §6 keys snapshots by venue/data
/// type/symbol only), so a snapshot can only observe entries cached under
/// these defaults — a prior fetch made with different parameters populates a
/// different cache key and won't show up here. Documented in DESIGN.md.
const SNAPSHOT_ORDER_BOOK_DEPTH: u32 = 50;
const SNAPSHOT_TRADES_LIMIT: u32 = 100;
const SNAPSHOT_KLINES_INTERVAL: Interval = Interval::OneMinute;
const SNAPSHOT_KLINES_LIMIT: u32 = 100;

/// One chain per data type, each populated at `register_venue` time with
/// every venue that claims to support it.
struct FallbackChains {
    order_book: FallbackChain,
    trades: FallbackChain,
    klines: FallbackChain,
    funding: FallbackChain,
    open_interest: FallbackChain,
}

impl FallbackChains {
    fn new() -> Self {
        Self {
            order_book: FallbackChain::new("order_book"),
            trades: FallbackChain::new("trades"),
            klines: FallbackChain::new("klines"),
            funding: FallbackChain::new("funding"),
            open_interest: FallbackChain::new("open_interest"),
        }
    }

    fn push(&self, adapter: &Arc<dyn VenueAdapter>) {
        if adapter.supports(DataType::OrderBook) {
            self.order_book.push(Arc::clone(adapter));
        }
        if adapter.supports(DataType::Trades) {
            self.trades.push(Arc::clone(adapter));
        }
        if adapter.supports(DataType::Klines) {
            self.klines.push(Arc::clone(adapter));
        }
        if adapter.supports(DataType::Funding) {
            self.funding.push(Arc::clone(adapter));
        }
        if adapter.supports(DataType::OpenInterest) {
            self.open_interest.push(Arc::clone(adapter));
        }
    }

    /// Pushes a fresh score for `venue` into every chain it appears in.
    /// No-op in a chain `venue` never registered with.
    fn update_score(&self, venue: &str, inputs: ScoreInputs) {
        self.order_book.update_score(venue, inputs);
        self.trades.update_score(venue, inputs);
        self.klines.update_score(venue, inputs);
        self.funding.update_score(venue, inputs);
        self.open_interest.update_score(venue, inputs);
    }

    fn reorder_all(&self) {
        self.order_book.reorder();
        self.trades.reorder();
        self.klines.reorder();
        self.funding.reorder();
        self.open_interest.reorder();
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
    drain_notify: &'a Notify,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drain_notify.notify_waiters();
        }
    }
}

/// The multi-venue cryptocurrency market-data facade.
///
/// Owns exactly one [`VenueRegistry`], one [`StreamManager`], one
/// [`VenueRuntime`] per registered venue, and one [`FallbackChain`] per data
/// type. No process-wide singletons — every caller builds and owns its own
/// `MarketFacade`.
pub struct MarketFacade {
    registry: Arc<VenueRegistry>,
    streams: StreamManager,
    venues: RwLock<HashMap<String, Arc<VenueRuntime>>>,
    fallback_chains: Arc<FallbackChains>,
    circuit_closed: Arc<StdMutex<HashMap<String, bool>>>,
    scorer: Scorer,
    snapshots: SnapshotStore,
    fan_out_concurrency: usize,
    in_flight: AtomicUsize,
    drain_notify: Notify,
}

impl MarketFacade {
    pub fn new(config: FacadeConfig) -> Self {
        let fallback_chains = Arc::new(FallbackChains::new());
        let circuit_closed: Arc<StdMutex<HashMap<String, bool>>> = Arc::new(StdMutex::new(HashMap::new()));
        let registry_cell: Arc<OnceLock<Arc<VenueRegistry>>> = Arc::new(OnceLock::new());
        let scorer = build_scorer(Arc::clone(&fallback_chains), Arc::clone(&circuit_closed), Arc::clone(&registry_cell));

        let health_scorer = Arc::clone(&scorer);
        let registry = Arc::new(
            VenueRegistry::builder()
                .health_check_interval(config.health_check_interval)
                .on_health_change(move |venue, _from, _to| health_scorer(venue))
                .build(),
        );
        registry_cell.set(Arc::clone(&registry)).ok();

        let streams = StreamManager::builder().build();

        Self {
            registry,
            streams,
            venues: RwLock::new(HashMap::new()),
            fallback_chains,
            circuit_closed,
            scorer,
            snapshots: SnapshotStore::new(),
            fan_out_concurrency: config.fan_out_concurrency.max(1),
            in_flight: AtomicUsize::new(0),
            drain_notify: Notify::new(),
        }
    }

    /// Registers a venue's REST adapter (and, if it streams, its WS
    /// adapter), wiring up that venue's rate limiter, circuit breaker and
    /// cache and adding it to every data type's fallback chain it supports.
    ///
    /// The venue's circuit breaker is wired so every state transition
    /// re-scores it in the fallback chains alongside health-check outcomes
    /// (see [`build_scorer`]), so a venue tripping its breaker moves to the
    /// back of the chain without waiting for the next health-check sweep.
    pub async fn register_venue(
        &self,
        adapter: Arc<dyn VenueAdapter>,
        stream_adapter: Option<Arc<dyn VenueStreamAdapter>>,
        venue_config: VenueConfig,
    ) -> Result<(), FacadeError> {
        let name = adapter.venue().to_string();
        self.registry.register(Arc::clone(&adapter)).await?;
        self.fallback_chains.push(&adapter);
        self.circuit_closed.lock().expect("circuit_closed lock poisoned").insert(name.clone(), true);

        let on_circuit_transition = {
            let venue = name.clone();
            let circuit_closed = Arc::clone(&self.circuit_closed);
            let scorer = Arc::clone(&self.scorer);
            move |_from: CircuitState, to: CircuitState| {
                circuit_closed
                    .lock()
                    .expect("circuit_closed lock poisoned")
                    .insert(venue.clone(), to != CircuitState::Open);
                scorer(&venue);
            }
        };

        let runtime = Arc::new(VenueRuntime::new(Arc::clone(&adapter), &venue_config, on_circuit_transition));
        self.venues.write().await.insert(name, runtime);

        if let Some(stream_adapter) = stream_adapter {
            self.streams.register(stream_adapter).await;
        }

        Ok(())
    }

    /// Starts every registered venue's adapter and spawns the registry's
    /// health-check supervisor.
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), FacadeError> {
        self.registry.start(ctx).await?;
        Ok(())
    }

    /// Waits for in-flight fetch calls to drain, then stops every venue
    /// adapter and tears down every stream connection.
    pub async fn shutdown(&self, ctx: CancellationToken) -> Result<(), FacadeError> {
        loop {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            let notified = self.drain_notify.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }

        self.streams.shutdown().await;
        self.registry.stop(ctx).await?;
        Ok(())
    }

    fn track_in_flight(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { in_flight: &self.in_flight, drain_notify: &self.drain_notify }
    }

    async fn runtime_for(&self, venue: &str) -> Result<Arc<VenueRuntime>, FacadeError> {
        self.venues
            .read()
            .await
            .get(venue)
            .cloned()
            .ok_or_else(|| FacadeError::from(RegistryError::UnknownVenue(venue.to_string())))
    }

    // ---- single-venue fetch operations ----

    pub async fn get_order_book(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
        depth: u32,
    ) -> Result<OrderBookSnapshot, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        let runtime = self.runtime_for(venue).await?;
        if !runtime.adapter.supports(DataType::OrderBook) {
            return Err(FacadeError::Unsupported { venue: venue.to_string(), endpoint: "order_book".to_string() });
        }

        let key = format!("order_book:{symbol}:{depth}");
        let value = runtime
            .execute("order_book", key, ORDER_BOOK_TTL, ctx, move |adapter, ctx| async move {
                adapter.get_order_book(ctx, &symbol, depth).await.map(CachedValue::OrderBook)
            })
            .await?;
        Ok(value.as_order_book().expect("order_book key namespaced by op"))
    }

    pub async fn get_trades(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<Trade>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        let runtime = self.runtime_for(venue).await?;
        if !runtime.adapter.supports(DataType::Trades) {
            return Err(FacadeError::Unsupported { venue: venue.to_string(), endpoint: "trades".to_string() });
        }

        let key = format!("trades:{symbol}:{limit}");
        let value = runtime
            .execute("trades", key, TRADES_TTL, ctx, move |adapter, ctx| async move {
                adapter.get_trades(ctx, &symbol, limit).await.map(CachedValue::Trades)
            })
            .await?;
        Ok(value.as_trades().expect("trades key namespaced by op"))
    }

    pub async fn get_klines(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Kline>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        let runtime = self.runtime_for(venue).await?;
        if !runtime.adapter.supports(DataType::Klines) {
            return Err(FacadeError::Unsupported { venue: venue.to_string(), endpoint: "klines".to_string() });
        }

        let key = format!("klines:{symbol}:{}:{limit}", interval_label(interval));
        let value = runtime
            .execute("klines", key, KLINES_TTL, ctx, move |adapter, ctx| async move {
                adapter.get_klines(ctx, &symbol, interval, limit).await.map(CachedValue::Klines)
            })
            .await?;
        Ok(value.as_klines().expect("klines key namespaced by op"))
    }

    pub async fn get_funding(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
    ) -> Result<FundingRate, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        let runtime = self.runtime_for(venue).await?;
        if !runtime.adapter.supports(DataType::Funding) {
            return Err(FacadeError::Unsupported { venue: venue.to_string(), endpoint: "funding".to_string() });
        }

        let key = format!("funding:{symbol}");
        let value = runtime
            .execute("funding", key, FUNDING_TTL, ctx, move |adapter, ctx| async move {
                adapter.get_funding(ctx, &symbol).await.map(CachedValue::Funding)
            })
            .await?;
        Ok(value.as_funding().expect("funding key namespaced by op"))
    }

    pub async fn get_open_interest(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
    ) -> Result<OpenInterest, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        let runtime = self.runtime_for(venue).await?;
        if !runtime.adapter.supports(DataType::OpenInterest) {
            return Err(FacadeError::Unsupported { venue: venue.to_string(), endpoint: "open_interest".to_string() });
        }

        let key = format!("open_interest:{symbol}");
        let value = runtime
            .execute("open_interest", key, OPEN_INTEREST_TTL, ctx, move |adapter, ctx| async move {
                adapter.get_open_interest(ctx, &symbol).await.map(CachedValue::OpenInterest)
            })
            .await?;
        Ok(value.as_open_interest().expect("open_interest key namespaced by op"))
    }

    // ---- bounded-concurrency multi-venue fan-out ----

    /// Runs `op` against each of `venues` with at most `fan_out_concurrency`
    /// in flight at once, collecting every result (success or error) without
    /// short-circuiting on the first failure.
    async fn fan_out<T, F, Fut>(&self, venues: Vec<String>, op: F) -> HashMap<String, Result<T, FacadeError>>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, FacadeError>>,
    {
        let semaphore = Semaphore::new(self.fan_out_concurrency);
        let mut results = HashMap::with_capacity(venues.len());

        let mut pending: futures::stream::FuturesUnordered<_> = venues
            .into_iter()
            .map(|venue| {
                let semaphore = &semaphore;
                let op = &op;
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    let result = op(venue.clone()).await;
                    (venue, result)
                }
            })
            .collect();

        use futures::StreamExt;
        while let Some((venue, result)) = pending.next().await {
            results.insert(venue, result);
        }

        results
    }

    pub async fn get_order_book_multi_venue(
        &self,
        ctx: CancellationToken,
        venues: Vec<String>,
        symbol: &str,
        depth: u32,
    ) -> HashMap<String, Result<OrderBookSnapshot, FacadeError>> {
        let symbol = symbol.to_string();
        self.fan_out(venues, |venue| {
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            async move { self.get_order_book(ctx, &venue, &symbol, depth).await }
        })
        .await
    }

    pub async fn get_trades_multi_venue(
        &self,
        ctx: CancellationToken,
        venues: Vec<String>,
        symbol: &str,
        limit: u32,
    ) -> HashMap<String, Result<Vec<Trade>, FacadeError>> {
        let symbol = symbol.to_string();
        self.fan_out(venues, |venue| {
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            async move { self.get_trades(ctx, &venue, &symbol, limit).await }
        })
        .await
    }

    pub async fn get_klines_multi_venue(
        &self,
        ctx: CancellationToken,
        venues: Vec<String>,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> HashMap<String, Result<Vec<Kline>, FacadeError>> {
        let symbol = symbol.to_string();
        self.fan_out(venues, |venue| {
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            async move { self.get_klines(ctx, &venue, &symbol, interval, limit).await }
        })
        .await
    }

    pub async fn get_funding_multi_venue(
        &self,
        ctx: CancellationToken,
        venues: Vec<String>,
        symbol: &str,
    ) -> HashMap<String, Result<FundingRate, FacadeError>> {
        let symbol = symbol.to_string();
        self.fan_out(venues, |venue| {
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            async move { self.get_funding(ctx, &venue, &symbol).await }
        })
        .await
    }

    pub async fn get_open_interest_multi_venue(
        &self,
        ctx: CancellationToken,
        venues: Vec<String>,
        symbol: &str,
    ) -> HashMap<String, Result<OpenInterest, FacadeError>> {
        let symbol = symbol.to_string();
        self.fan_out(venues, |venue| {
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            async move { self.get_open_interest(ctx, &venue, &symbol).await }
        })
        .await
    }

    // ---- fallback-chain variants ----

    /// Runs `op` (one of this venue's own pipeline methods, already bound to
    /// a data type and symbol) against every venue in `chain`'s current
    /// order, returning the first success. Adapts the chain's
    /// `Result<T, AdapterError>` contract by converting any internal
    /// `FacadeError` the pipeline produces back down to an opaque
    /// `AdapterError`, since the fallback chain has no visibility into the
    /// facade's richer error kinds.
    async fn fetch_with_fallback<T, F, Fut>(
        &self,
        chain: &FallbackChain,
        ctx: CancellationToken,
        op: F,
    ) -> Result<FallbackResult<T>, FacadeError>
    where
        F: Fn(Arc<dyn VenueAdapter>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        chain.fetch_with_fallback(ctx, op).await.map_err(FacadeError::from)
    }

    pub async fn get_order_book_with_fallback(
        &self,
        ctx: CancellationToken,
        symbol: &str,
        depth: u32,
    ) -> Result<FallbackResult<OrderBookSnapshot>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        self.fetch_with_fallback(&self.fallback_chains.order_book, ctx, |adapter, ctx| {
            let symbol = symbol.clone();
            async move {
                let runtime = self.runtime_for(adapter.venue()).await.map_err(|e| AdapterError::msg(e.to_string()))?;
                let key = format!("order_book:{symbol}:{depth}");
                runtime
                    .execute("order_book", key, ORDER_BOOK_TTL, ctx, move |adapter, ctx| async move {
                        adapter.get_order_book(ctx, &symbol, depth).await.map(CachedValue::OrderBook)
                    })
                    .await
                    .map(|v| v.as_order_book().expect("order_book key namespaced by op"))
                    .map_err(|e| AdapterError::msg(e.to_string()))
            }
        })
        .await
    }

    pub async fn get_trades_with_fallback(
        &self,
        ctx: CancellationToken,
        symbol: &str,
        limit: u32,
    ) -> Result<FallbackResult<Vec<Trade>>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        self.fetch_with_fallback(&self.fallback_chains.trades, ctx, |adapter, ctx| {
            let symbol = symbol.clone();
            async move {
                let runtime = self.runtime_for(adapter.venue()).await.map_err(|e| AdapterError::msg(e.to_string()))?;
                let key = format!("trades:{symbol}:{limit}");
                runtime
                    .execute("trades", key, TRADES_TTL, ctx, move |adapter, ctx| async move {
                        adapter.get_trades(ctx, &symbol, limit).await.map(CachedValue::Trades)
                    })
                    .await
                    .map(|v| v.as_trades().expect("trades key namespaced by op"))
                    .map_err(|e| AdapterError::msg(e.to_string()))
            }
        })
        .await
    }

    pub async fn get_klines_with_fallback(
        &self,
        ctx: CancellationToken,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<FallbackResult<Vec<Kline>>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        self.fetch_with_fallback(&self.fallback_chains.klines, ctx, |adapter, ctx| {
            let symbol = symbol.clone();
            async move {
                let runtime = self.runtime_for(adapter.venue()).await.map_err(|e| AdapterError::msg(e.to_string()))?;
                let key = format!("klines:{symbol}:{}:{limit}", interval_label(interval));
                runtime
                    .execute("klines", key, KLINES_TTL, ctx, move |adapter, ctx| async move {
                        adapter.get_klines(ctx, &symbol, interval, limit).await.map(CachedValue::Klines)
                    })
                    .await
                    .map(|v| v.as_klines().expect("klines key namespaced by op"))
                    .map_err(|e| AdapterError::msg(e.to_string()))
            }
        })
        .await
    }

    pub async fn get_funding_with_fallback(
        &self,
        ctx: CancellationToken,
        symbol: &str,
    ) -> Result<FallbackResult<FundingRate>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        self.fetch_with_fallback(&self.fallback_chains.funding, ctx, |adapter, ctx| {
            let symbol = symbol.clone();
            async move {
                let runtime = self.runtime_for(adapter.venue()).await.map_err(|e| AdapterError::msg(e.to_string()))?;
                let key = format!("funding:{symbol}");
                runtime
                    .execute("funding", key, FUNDING_TTL, ctx, move |adapter, ctx| async move {
                        adapter.get_funding(ctx, &symbol).await.map(CachedValue::Funding)
                    })
                    .await
                    .map(|v| v.as_funding().expect("funding key namespaced by op"))
                    .map_err(|e| AdapterError::msg(e.to_string()))
            }
        })
        .await
    }

    pub async fn get_open_interest_with_fallback(
        &self,
        ctx: CancellationToken,
        symbol: &str,
    ) -> Result<FallbackResult<OpenInterest>, FacadeError> {
        let _guard = self.track_in_flight();
        let symbol = parse_symbol(symbol)?;
        self.fetch_with_fallback(&self.fallback_chains.open_interest, ctx, |adapter, ctx| {
            let symbol = symbol.clone();
            async move {
                let runtime = self.runtime_for(adapter.venue()).await.map_err(|e| AdapterError::msg(e.to_string()))?;
                let key = format!("open_interest:{symbol}");
                runtime
                    .execute("open_interest", key, OPEN_INTEREST_TTL, ctx, move |adapter, ctx| async move {
                        adapter.get_open_interest(ctx, &symbol).await.map(CachedValue::OpenInterest)
                    })
                    .await
                    .map(|v| v.as_open_interest().expect("open_interest key namespaced by op"))
                    .map_err(|e| AdapterError::msg(e.to_string()))
            }
        })
        .await
    }

    /// Reorders every fallback chain by each venue's latest score.
    ///
    /// Normally unnecessary to call directly: every health-check outcome and
    /// circuit breaker transition already triggers a rescore-and-reorder of
    /// the venue involved (see [`build_scorer`]). Exposed for callers that
    /// want to force a resort, e.g. right after registering a batch of
    /// venues with pre-existing `ScoreInputs`.
    pub fn reorder_fallback_chains(&self) {
        self.fallback_chains.reorder_all();
    }

    pub fn update_fallback_score(&self, venue: &str, inputs: ScoreInputs) {
        self.fallback_chains.update_score(venue, inputs);
    }

    // ---- streaming ----

    pub async fn subscribe_trades(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
    ) -> Result<broadcast::Receiver<MarketEvent>, FacadeError> {
        let symbol = parse_symbol(symbol)?;
        Ok(self.streams.subscribe(ctx, venue, "trades", symbol).await?)
    }

    pub async fn subscribe_klines(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
        interval: Interval,
    ) -> Result<broadcast::Receiver<MarketEvent>, FacadeError> {
        let symbol = parse_symbol(symbol)?;
        let channel = format!("klines:{}", interval_label(interval));
        Ok(self.streams.subscribe(ctx, venue, &channel, symbol).await?)
    }

    pub async fn subscribe_order_book(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
        depth: u32,
    ) -> Result<broadcast::Receiver<MarketEvent>, FacadeError> {
        let symbol = parse_symbol(symbol)?;
        let channel = format!("order_book:{depth}");
        Ok(self.streams.subscribe(ctx, venue, &channel, symbol).await?)
    }

    pub async fn subscribe_funding(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
    ) -> Result<broadcast::Receiver<MarketEvent>, FacadeError> {
        let symbol = parse_symbol(symbol)?;
        Ok(self.streams.subscribe(ctx, venue, "funding", symbol).await?)
    }

    pub async fn subscribe_open_interest(
        &self,
        ctx: CancellationToken,
        venue: &str,
        symbol: &str,
    ) -> Result<broadcast::Receiver<MarketEvent>, FacadeError> {
        let symbol = parse_symbol(symbol)?;
        Ok(self.streams.subscribe(ctx, venue, "open_interest", symbol).await?)
    }

    pub async fn unsubscribe(&self, venue: &str, channel: &str, symbol: &str) -> Result<(), FacadeError> {
        let symbol = parse_symbol(symbol)?;
        self.streams.unsubscribe(venue, channel, &symbol).await;
        Ok(())
    }

    // ---- snapshots ----

    /// Captures the current cache contents for `(venue, data_type, symbol)`
    /// tuples in `keys` under `id`, overwriting any prior snapshot with that
    /// id. A tuple with nothing cached yet is recorded in the snapshot's
    /// `missing` list rather than failing the whole call.
    pub async fn create_snapshot(&self, id: impl Into<String>, keys: Vec<SnapshotKey>) -> Result<(), FacadeError> {
        let mut entries = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            let runtime = match self.venues.read().await.get(&key.venue).cloned() {
                Some(r) => r,
                None => {
                    missing.push(key);
                    continue;
                }
            };
            let cache_key = match key.data_type {
                DataType::OrderBook => format!("order_book:{}:{SNAPSHOT_ORDER_BOOK_DEPTH}", key.symbol),
                DataType::Trades => format!("trades:{}:{SNAPSHOT_TRADES_LIMIT}", key.symbol),
                DataType::Klines => format!(
                    "klines:{}:{}:{SNAPSHOT_KLINES_LIMIT}",
                    key.symbol,
                    interval_label(SNAPSHOT_KLINES_INTERVAL)
                ),
                DataType::Funding => format!("funding:{}", key.symbol),
                DataType::OpenInterest => format!("open_interest:{}", key.symbol),
            };
            match runtime.cache.get(&cache_key) {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => missing.push(key),
            }
        }

        self.snapshots.create(id, entries, missing);
        Ok(())
    }

    pub fn get_snapshot(&self, id: &str) -> Option<Snapshot> {
        self.snapshots.get(id)
    }

    // ---- health and metrics ----

    pub async fn get_health(&self) -> HashMap<String, HealthRecord> {
        self.registry.all_health().await
    }

    pub async fn get_venue_health(&self, venue: &str) -> Result<HealthRecord, FacadeError> {
        Ok(self.registry.health_of(venue).await?)
    }

    /// Adapters the registry considers Healthy _and_ whose circuit breaker
    /// isn't Open. The registry alone only sees the health-check side of the
    /// conjunction (started, consecutive failures, success rate); a venue
    /// can pass all three of those and still have its breaker freshly
    /// tripped by live call failures the health-check sweep hasn't caught up
    /// to yet, so this is the predicate callers should use to pick a venue
    /// to call right now.
    pub async fn get_healthy_venues(&self) -> Vec<Arc<dyn VenueAdapter>> {
        let healthy = self.registry.get_healthy().await;
        let circuit_closed = self.circuit_closed.lock().expect("circuit_closed lock poisoned");
        healthy.into_iter().filter(|adapter| circuit_closed.get(adapter.venue()).copied().unwrap_or(true)).collect()
    }

    /// Per-venue cache hit/miss counters. Rate limiter and circuit breaker
    /// counters are exported as metrics directly (via the `metrics`
    /// feature) rather than duplicated here.
    pub async fn get_metrics(&self) -> HashMap<String, CacheMetrics> {
        self.venues
            .read()
            .await
            .iter()
            .map(|(venue, runtime)| {
                (
                    venue.clone(),
                    CacheMetrics { hits: runtime.cache.hits(), misses: runtime.cache.misses(), hit_rate: runtime.cache.hit_rate() },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use market_facade_registry::VenueLimits;
    use market_facade_types::{PriceLevel, Provenance};
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration as StdDuration;

    struct MockAdapter {
        name: &'static str,
        data_types: Vec<DataType>,
        calls: AtomicU32,
        fail: bool,
    }

    impl MockAdapter {
        fn new(name: &'static str, data_types: Vec<DataType>) -> Self {
            Self { name, data_types, calls: AtomicU32::new(0), fail: false }
        }

        fn failing(name: &'static str, data_types: Vec<DataType>) -> Self {
            Self { name, data_types, calls: AtomicU32::new(0), fail: true }
        }

        fn sample_book(&self, symbol: &CanonicalSymbol) -> OrderBookSnapshot {
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

    impl VenueAdapter for MockAdapter {
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail { Err(AdapterError::msg("boom")) } else { Ok(self.sample_book(symbol)) };
            Box::pin(async move { result })
        }

        fn get_trades(
            &self,
            _ctx: CancellationToken,
            _symbol: &CanonicalSymbol,
            _limit: u32,
        ) -> BoxFuture<'_, Result<Vec<Trade>, AdapterError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail { Err(AdapterError::msg("boom")) } else { Ok(Vec::new()) };
            Box::pin(async move { result })
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
                requests_per_second: 100.0,
                burst: 50,
                timeout: StdDuration::from_secs(1),
                max_retries: 0,
            }
        }
    }

    fn fast_venue_config() -> VenueConfig {
        VenueConfig {
            rate_limit_rps: 1000.0,
            burst: 1000,
            request_timeout: StdDuration::from_secs(1),
            ..VenueConfig::default()
        }
    }

    #[tokio::test]
    async fn fetch_populates_cache_and_second_call_is_a_hit() {
        let facade = MarketFacade::new(FacadeConfig::default());
        let adapter = Arc::new(MockAdapter::new("binance", vec![DataType::OrderBook]));
        facade.register_venue(adapter.clone(), None, fast_venue_config()).await.unwrap();

        let ctx = CancellationToken::new();
        facade.get_order_book(ctx.clone(), "binance", "BTC-USD", 10).await.unwrap();
        facade.get_order_book(ctx, "binance", "BTC-USD", 10).await.unwrap();

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_data_type_is_rejected_before_touching_the_adapter() {
        let facade = MarketFacade::new(FacadeConfig::default());
        let adapter = Arc::new(MockAdapter::new("binance", vec![DataType::Trades]));
        facade.register_venue(adapter.clone(), None, fast_venue_config()).await.unwrap();

        let err = facade.get_order_book(CancellationToken::new(), "binance", "BTC-USD", 10).await.unwrap_err();
        assert!(matches!(err, FacadeError::Unsupported { .. }));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_venue_surfaces_as_unknown_venue() {
        let facade = MarketFacade::new(FacadeConfig::default());
        let err = facade.get_order_book(CancellationToken::new(), "nope", "BTC-USD", 10).await.unwrap_err();
        assert!(matches!(err, FacadeError::Registry(RegistryError::UnknownVenue(v)) if v == "nope"));
    }

    #[tokio::test]
    async fn invalid_symbol_is_rejected_before_any_venue_lookup() {
        let facade = MarketFacade::new(FacadeConfig::default());
        let err = facade.get_order_book(CancellationToken::new(), "binance", "not-a-symbol", 10).await.unwrap_err();
        assert!(matches!(err, FacadeError::InvalidSymbol { .. }));
    }

    #[tokio::test]
    async fn multi_venue_fan_out_collects_partial_failure() {
        let facade = MarketFacade::new(FacadeConfig::default());
        facade
            .register_venue(Arc::new(MockAdapter::new("binance", vec![DataType::OrderBook])), None, fast_venue_config())
            .await
            .unwrap();
        facade
            .register_venue(Arc::new(MockAdapter::failing("kraken", vec![DataType::OrderBook])), None, fast_venue_config())
            .await
            .unwrap();

        let results = facade
            .get_order_book_multi_venue(
                CancellationToken::new(),
                vec!["binance".to_string(), "kraken".to_string()],
                "BTC-USD",
                10,
            )
            .await;

        assert!(results["binance"].is_ok());
        assert!(results["kraken"].is_err());
    }

    #[tokio::test]
    async fn fallback_serves_from_first_healthy_venue_and_skips_the_rest() {
        let facade = MarketFacade::new(FacadeConfig::default());
        let failing = Arc::new(MockAdapter::failing("venue_a", vec![DataType::OrderBook]));
        let healthy = Arc::new(MockAdapter::new("venue_b", vec![DataType::OrderBook]));
        let never_called = Arc::new(MockAdapter::new("venue_c", vec![DataType::OrderBook]));

        facade.register_venue(failing.clone(), None, fast_venue_config()).await.unwrap();
        facade.register_venue(healthy.clone(), None, fast_venue_config()).await.unwrap();
        facade.register_venue(never_called.clone(), None, fast_venue_config()).await.unwrap();

        let result = facade
            .get_order_book_with_fallback(CancellationToken::new(), "BTC-USD", 10)
            .await
            .unwrap();

        assert_eq!(result.served_by, "venue_b");
        assert_eq!(never_called.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn snapshot_round_trips_a_cached_value_and_records_misses() {
        let facade = MarketFacade::new(FacadeConfig::default());
        facade
            .register_venue(Arc::new(MockAdapter::new("binance", vec![DataType::OrderBook])), None, fast_venue_config())
            .await
            .unwrap();

        facade.get_order_book(CancellationToken::new(), "binance", "BTC-USD", SNAPSHOT_ORDER_BOOK_DEPTH).await.unwrap();

        let cached_key = SnapshotKey { venue: "binance".to_string(), data_type: DataType::OrderBook, symbol: "BTC-USD".to_string() };
        let missing_key = SnapshotKey { venue: "binance".to_string(), data_type: DataType::Trades, symbol: "BTC-USD".to_string() };
        facade.create_snapshot("report-1", vec![cached_key.clone(), missing_key.clone()]).await.unwrap();

        let snapshot = facade.get_snapshot("report-1").unwrap();
        assert!(snapshot.entries.contains_key(&cached_key));
        assert!(snapshot.missing.contains(&missing_key));
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_calls_before_stopping_adapters() {
        let facade = MarketFacade::new(FacadeConfig::default());
        facade
            .register_venue(Arc::new(MockAdapter::new("binance", vec![DataType::OrderBook])), None, fast_venue_config())
            .await
            .unwrap();
        facade.start(CancellationToken::new()).await.unwrap();

        facade.get_order_book(CancellationToken::new(), "binance", "BTC-USD", 10).await.unwrap();
        facade.shutdown(CancellationToken::new()).await.unwrap();
    }
}
