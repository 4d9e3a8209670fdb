//! The venue registry: owns every adapter, starts/stops them as a unit, and
//! runs a background supervisor loop that keeps each one's [`HealthRecord`]
//! current.
//!
//! The supervisor loop itself is grounded on the teacher's
//! `HealthCheckWrapper::start` — a `tokio::time::interval` tick fanning out
//! into one nested `tokio::spawn` + `tokio::time::timeout` per resource, with
//! status promotion gated by consecutive success/failure thresholds. What's
//! new relative to the teacher: adapters are keyed by name instead of held
//! in an unordered `Vec`, and the registry owns adapter lifecycle
//! (`start`/`stop`) in addition to just checking health.

use crate::adapter::VenueAdapter;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::events::RegistryEvent;
use crate::health::{HealthRecord, HealthTracker};
use market_facade_core::DataType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Venue {
    adapter: Arc<dyn VenueAdapter>,
    health: Arc<HealthTracker>,
}

/// Stores every venue adapter keyed by its unique name, starts and stops
/// them as a unit, and supervises their health in the background.
pub struct VenueRegistry {
    config: RegistryConfig,
    venues: Arc<RwLock<HashMap<String, Venue>>>,
    supervisor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl VenueRegistry {
    pub(crate) fn from_config(config: RegistryConfig) -> Self {
        Self {
            config,
            venues: Arc::new(RwLock::new(HashMap::new())),
            supervisor: std::sync::Mutex::new(None),
        }
    }

    /// Starts building a registry via [`crate::RegistryConfigBuilder`].
    pub fn builder() -> crate::RegistryConfigBuilder {
        crate::RegistryConfigBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Adds an adapter under its own `venue()` name. Fails if that name is
    /// already registered.
    pub async fn register(&self, adapter: Arc<dyn VenueAdapter>) -> Result<(), RegistryError> {
        let name = adapter.venue().to_string();
        let mut venues = self.venues.write().await;
        if venues.contains_key(&name) {
            return Err(RegistryError::DuplicateVenue(name));
        }
        venues.insert(
            name.clone(),
            Venue {
                adapter,
                health: Arc::new(HealthTracker::new()),
            },
        );
        self.config.event_listeners.emit(&RegistryEvent::VenueRegistered {
            venue: name,
            timestamp: Instant::now(),
        });
        Ok(())
    }

    /// Starts every registered adapter, in registration order. If any
    /// adapter's `start` fails, every adapter started before it is rolled
    /// back (best-effort `stop`) and the original error is returned — no
    /// adapter is left half-started. On success, spawns the health-check
    /// supervisor loop.
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), RegistryError> {
        let snapshot: Vec<(String, Arc<dyn VenueAdapter>, Arc<HealthTracker>)> = {
            let venues = self.venues.read().await;
            venues
                .iter()
                .map(|(name, v)| (name.clone(), Arc::clone(&v.adapter), Arc::clone(&v.health)))
                .collect()
        };

        let failure_threshold = self.config.failure_threshold;
        let min_success_rate = self.config.min_success_rate;

        let mut started: Vec<(String, Arc<dyn VenueAdapter>)> = Vec::with_capacity(snapshot.len());
        for (name, adapter, health) in snapshot {
            match adapter.start(ctx.clone()).await {
                Ok(()) => {
                    health.mark_started(failure_threshold, min_success_rate);
                    self.config.event_listeners.emit(&RegistryEvent::VenueStarted {
                        venue: name.clone(),
                        timestamp: Instant::now(),
                    });
                    started.push((name, adapter));
                }
                Err(source) => {
                    self.config.event_listeners.emit(&RegistryEvent::VenueStartFailed {
                        venue: name.clone(),
                        timestamp: Instant::now(),
                    });
                    for (rollback_name, rollback_adapter) in started.into_iter().rev() {
                        let _ = rollback_adapter.stop(ctx.clone()).await;
                        self.config.event_listeners.emit(&RegistryEvent::VenueStopped {
                            venue: rollback_name,
                            timestamp: Instant::now(),
                        });
                    }
                    return Err(RegistryError::StartFailed { venue: name, source });
                }
            }
        }

        self.spawn_supervisor(ctx);
        Ok(())
    }

    /// Stops every registered adapter. Unlike `start`, this does not
    /// short-circuit: every adapter is given a chance to stop, and all
    /// failures are collected into one error.
    pub async fn stop(&self, ctx: CancellationToken) -> Result<(), RegistryError> {
        self.stop_supervisor();

        let snapshot: Vec<(String, Arc<dyn VenueAdapter>)> = {
            let venues = self.venues.read().await;
            venues.iter().map(|(name, v)| (name.clone(), Arc::clone(&v.adapter))).collect()
        };

        let mut errors = Vec::new();
        for (name, adapter) in snapshot {
            match adapter.stop(ctx.clone()).await {
                Ok(()) => {
                    self.config.event_listeners.emit(&RegistryEvent::VenueStopped {
                        venue: name,
                        timestamp: Instant::now(),
                    });
                }
                Err(source) => errors.push((name, source)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::StopFailed(errors))
        }
    }

    /// Returns the adapter registered under `venue`, if any.
    pub async fn get(&self, venue: &str) -> Result<Arc<dyn VenueAdapter>, RegistryError> {
        self.venues
            .read()
            .await
            .get(venue)
            .map(|v| Arc::clone(&v.adapter))
            .ok_or_else(|| RegistryError::UnknownVenue(venue.to_string()))
    }

    /// Returns every registered adapter.
    pub async fn get_all(&self) -> Vec<Arc<dyn VenueAdapter>> {
        self.venues.read().await.values().map(|v| Arc::clone(&v.adapter)).collect()
    }

    /// Returns adapters whose latest [`HealthRecord`] reports `Healthy`.
    pub async fn get_healthy(&self) -> Vec<Arc<dyn VenueAdapter>> {
        self.venues
            .read()
            .await
            .values()
            .filter(|v| v.health.snapshot().status.is_healthy())
            .map(|v| Arc::clone(&v.adapter))
            .collect()
    }

    /// Returns adapters that claim to support `data_type`.
    pub async fn get_supporting(&self, data_type: DataType) -> Vec<Arc<dyn VenueAdapter>> {
        self.venues
            .read()
            .await
            .values()
            .filter(|v| v.adapter.supports(data_type))
            .map(|v| Arc::clone(&v.adapter))
            .collect()
    }

    /// Returns the current health record for one venue.
    pub async fn health_of(&self, venue: &str) -> Result<HealthRecord, RegistryError> {
        self.venues
            .read()
            .await
            .get(venue)
            .map(|v| v.health.snapshot())
            .ok_or_else(|| RegistryError::UnknownVenue(venue.to_string()))
    }

    /// Returns the current health record for every venue.
    pub async fn all_health(&self) -> HashMap<String, HealthRecord> {
        self.venues
            .read()
            .await
            .iter()
            .map(|(name, v)| (name.clone(), v.health.snapshot()))
            .collect()
    }

    /// Non-blocking best-effort read of one venue's health record, for
    /// callers (like a circuit breaker's synchronous state-transition
    /// listener) that cannot await a lock. Returns `None` if the venue is
    /// unknown or the registry's venue map is momentarily write-locked.
    pub fn try_health_of(&self, venue: &str) -> Option<HealthRecord> {
        self.venues.try_read().ok()?.get(venue).map(|v| v.health.snapshot())
    }

    fn spawn_supervisor(&self, ctx: CancellationToken) {
        let venues = Arc::clone(&self.venues);
        let interval = self.config.health_check_interval;
        let initial_delay = self.config.initial_delay;
        let timeout = self.config.health_check_timeout;
        let min_success_rate = self.config.min_success_rate;
        let failure_threshold = self.config.failure_threshold;
        let event_listeners = self.config.event_listeners.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let snapshot: Vec<(String, Arc<dyn VenueAdapter>, Arc<HealthTracker>)> = {
                    let venues = venues.read().await;
                    venues
                        .iter()
                        .map(|(name, v)| (name.clone(), Arc::clone(&v.adapter), Arc::clone(&v.health)))
                        .collect()
                };

                let mut checks = Vec::with_capacity(snapshot.len());
                for (name, adapter, health) in snapshot {
                    let check_ctx = ctx.clone();
                    let event_listeners = event_listeners.clone();
                    checks.push(tokio::spawn(async move {
                        let started_at = Instant::now();
                        let outcome = tokio::time::timeout(timeout, adapter.health_check(check_ctx)).await;
                        let latency = started_at.elapsed();

                        let (from, to) = match outcome {
                            Ok(Ok(())) => health.record_success(latency, failure_threshold, min_success_rate),
                            Ok(Err(_)) => health.record_failure(failure_threshold, min_success_rate),
                            Err(_) => {
                                event_listeners.emit(&RegistryEvent::HealthCheckTimedOut {
                                    venue: name.clone(),
                                    timestamp: Instant::now(),
                                });
                                health.record_failure(failure_threshold, min_success_rate)
                            }
                        };

                        if from != to {
                            event_listeners.emit(&RegistryEvent::HealthChanged {
                                venue: name,
                                from,
                                to,
                                timestamp: Instant::now(),
                            });
                        }
                    }));
                }

                for check in checks {
                    let _ = check.await;
                }
            }
        });

        *self.supervisor.lock().expect("supervisor lock poisoned") = Some(handle);
    }

    fn stop_supervisor(&self) {
        if let Some(handle) = self.supervisor.lock().expect("supervisor lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for VenueRegistry {
    fn drop(&mut self) {
        self.stop_supervisor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use futures::future::BoxFuture;
    use market_facade_types::{CanonicalSymbol, FundingRate, Interval, Kline, OpenInterest, OrderBookSnapshot, Trade};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    struct MockAdapter {
        name: &'static str,
        healthy: AtomicBool,
        start_calls: AtomicU32,
        stop_calls: AtomicU32,
        fail_start: bool,
    }

    impl MockAdapter {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                healthy: AtomicBool::new(true),
                start_calls: AtomicU32::new(0),
                stop_calls: AtomicU32::new(0),
                fail_start: false,
            }
        }

        fn failing_start(name: &'static str) -> Self {
            Self {
                fail_start: true,
                ..Self::new(name)
            }
        }
    }

    impl VenueAdapter for MockAdapter {
        fn venue(&self) -> &str {
            self.name
        }

        fn supports(&self, data_type: DataType) -> bool {
            matches!(data_type, DataType::OrderBook)
        }

        fn start(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
            Box::pin(async move {
                self.start_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_start {
                    Err(AdapterError::msg("boom"))
                } else {
                    Ok(())
                }
            })
        }

        fn stop(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
            Box::pin(async move {
                self.stop_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn health_check(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
            Box::pin(async move {
                if self.healthy.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(AdapterError::msg("unhealthy"))
                }
            })
        }

        fn get_order_book(
            &self,
            _ctx: CancellationToken,
            _symbol: &CanonicalSymbol,
            _depth: u32,
        ) -> BoxFuture<'_, Result<OrderBookSnapshot, AdapterError>> {
            Box::pin(async move { Err(AdapterError::msg("unimplemented")) })
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

        fn get_limits(&self) -> crate::adapter::VenueLimits {
            crate::adapter::VenueLimits {
                requests_per_second: 10.0,
                burst: 5,
                timeout: Duration::from_secs(1),
                max_retries: 3,
            }
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_venue() {
        let registry = crate::RegistryConfigBuilder::new().build();
        registry.register(Arc::new(MockAdapter::new("binance"))).await.unwrap();
        let err = registry.register(Arc::new(MockAdapter::new("binance"))).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateVenue(name) if name == "binance"));
    }

    #[tokio::test]
    async fn get_unknown_venue_is_an_error() {
        let registry = crate::RegistryConfigBuilder::new().build();
        let err = registry.get("nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownVenue(name) if name == "nope"));
    }

    #[tokio::test]
    async fn start_rolls_back_on_first_failure() {
        let registry = crate::RegistryConfigBuilder::new().build();
        let good = Arc::new(MockAdapter::new("binance"));
        let bad = Arc::new(MockAdapter::failing_start("kraken"));
        registry.register(good.clone()).await.unwrap();
        registry.register(bad.clone()).await.unwrap();

        let err = registry.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RegistryError::StartFailed { venue, .. } if venue == "kraken"));
        assert_eq!(good.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_collects_errors_without_short_circuiting() {
        struct FailingStop(MockAdapter);
        impl VenueAdapter for FailingStop {
            fn venue(&self) -> &str {
                self.0.venue()
            }
            fn supports(&self, dt: DataType) -> bool {
                self.0.supports(dt)
            }
            fn start(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
                self.0.start(ctx)
            }
            fn stop(&self, _ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
                Box::pin(async move { Err(AdapterError::msg("stop failed")) })
            }
            fn health_check(&self, ctx: CancellationToken) -> BoxFuture<'_, Result<(), AdapterError>> {
                self.0.health_check(ctx)
            }
            fn get_order_book(
                &self,
                ctx: CancellationToken,
                symbol: &CanonicalSymbol,
                depth: u32,
            ) -> BoxFuture<'_, Result<OrderBookSnapshot, AdapterError>> {
                self.0.get_order_book(ctx, symbol, depth)
            }
            fn get_trades(
                &self,
                ctx: CancellationToken,
                symbol: &CanonicalSymbol,
                limit: u32,
            ) -> BoxFuture<'_, Result<Vec<Trade>, AdapterError>> {
                self.0.get_trades(ctx, symbol, limit)
            }
            fn get_klines(
                &self,
                ctx: CancellationToken,
                symbol: &CanonicalSymbol,
                interval: Interval,
                limit: u32,
            ) -> BoxFuture<'_, Result<Vec<Kline>, AdapterError>> {
                self.0.get_klines(ctx, symbol, interval, limit)
            }
            fn get_funding(
                &self,
                ctx: CancellationToken,
                symbol: &CanonicalSymbol,
            ) -> BoxFuture<'_, Result<FundingRate, AdapterError>> {
                self.0.get_funding(ctx, symbol)
            }
            fn get_open_interest(
                &self,
                ctx: CancellationToken,
                symbol: &CanonicalSymbol,
            ) -> BoxFuture<'_, Result<OpenInterest, AdapterError>> {
                self.0.get_open_interest(ctx, symbol)
            }
            fn get_limits(&self) -> crate::adapter::VenueLimits {
                self.0.get_limits()
            }
        }

        let registry = crate::RegistryConfigBuilder::new().build();
        registry.register(Arc::new(MockAdapter::new("binance"))).await.unwrap();
        registry.register(Arc::new(FailingStop(MockAdapter::new("kraken")))).await.unwrap();

        let err = registry.stop(CancellationToken::new()).await.unwrap_err();
        match err {
            RegistryError::StopFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "kraken");
            }
            other => panic!("expected StopFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_healthy_is_subset_of_get_all() {
        let registry = crate::RegistryConfigBuilder::new()
            .health_check_interval(Duration::from_millis(20))
            .initial_delay(Duration::from_millis(0))
            .build();

        let healthy = Arc::new(MockAdapter::new("binance"));
        let unhealthy = Arc::new(MockAdapter::new("kraken"));
        unhealthy.healthy.store(false, Ordering::SeqCst);

        registry.register(healthy).await.unwrap();
        registry.register(unhealthy).await.unwrap();

        registry.start(CancellationToken::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let all = registry.get_all().await;
        let healthy_only = registry.get_healthy().await;
        assert_eq!(all.len(), 2);
        assert_eq!(healthy_only.len(), 1);
        assert_eq!(healthy_only[0].venue(), "binance");
    }

    #[tokio::test]
    async fn get_supporting_filters_by_data_type() {
        let registry = crate::RegistryConfigBuilder::new().build();
        registry.register(Arc::new(MockAdapter::new("binance"))).await.unwrap();

        let order_book = registry.get_supporting(DataType::OrderBook).await;
        let funding = registry.get_supporting(DataType::Funding).await;
        assert_eq!(order_book.len(), 1);
        assert_eq!(funding.len(), 0);
    }
}
