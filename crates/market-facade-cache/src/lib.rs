//! Bounded, expiring key→value cache with hit/miss telemetry.
//!
//! Eviction is driven purely by expiry: when the cache is full, the entry
//! closest to expiring anyway is the one given up, rather than an
//! access-pattern policy like LRU. A background sweeper periodically
//! removes expired entries so memory isn't held by keys nobody has looked
//! up again.
//!
//! Optionally, a `stale_window` lets an expired entry keep serving callers
//! for a grace period while a single background refresh repopulates it —
//! at most one refresh runs per key at a time; concurrent callers for the
//! same key are coalesced onto that one refresh.
//!
//! # Examples
//!
//! ```
//! use market_facade_cache::CacheConfigBuilder;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache = CacheConfigBuilder::new()
//!     .capacity(1_000)
//!     .default_ttl(Duration::from_secs(5))
//!     .name("kraken-order-book")
//!     .build::<String, String, std::io::Error>();
//!
//! cache.set("BTC-USD".to_string(), "...snapshot...".to_string(), Duration::from_secs(5));
//! let hit = cache.get(&"BTC-USD".to_string());
//! assert!(hit.is_some());
//! # }
//! ```

mod config;
mod error;
mod events;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use events::CacheEvent;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use store::{CacheStore, Lookup};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

type InflightMap<K, V, E> = StdMutex<HashMap<K, broadcast::Sender<Result<V, Arc<E>>>>>;

/// A bounded, expiring cache keyed by `K` holding values of type `V`, whose
/// refresh closures may fail with `E`.
///
/// Cheap to clone — every clone shares the same store, telemetry counters,
/// and background sweeper.
pub struct Cache<K, V, E> {
    config: Arc<CacheConfig>,
    store: Arc<StdMutex<CacheStore<K, V>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    inflight: Arc<InflightMap<K, V, E>>,
    sweeper_cancel: CancellationToken,
    _err: PhantomData<fn() -> E>,
}

impl<K, V, E> Clone for Cache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
            inflight: Arc::clone(&self.inflight),
            sweeper_cancel: self.sweeper_cancel.clone(),
            _err: PhantomData,
        }
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn from_config(config: CacheConfig) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(StdMutex::new(CacheStore::new(config.capacity)));
        let sweeper_cancel = CancellationToken::new();

        if config.enabled {
            let store = Arc::clone(&store);
            let sweep_config = Arc::clone(&config);
            let cancel = sweeper_cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(sweep_config.sweep_interval) => {}
                    }

                    let swept = {
                        let mut store = store.lock().unwrap();
                        store.sweep_expired(Instant::now(), sweep_config.stale_window)
                    };
                    for _ in 0..swept {
                        sweep_config.event_listeners.emit(&CacheEvent::Eviction {
                            pattern_name: sweep_config.name.clone(),
                            timestamp: Instant::now(),
                        });
                    }
                }
            });
        }

        Self {
            config,
            store,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            inflight: Arc::new(StdMutex::new(HashMap::new())),
            sweeper_cancel,
            _err: PhantomData,
        }
    }

    /// Starts building a new cache.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Looks up `key`. Does not trigger any refresh, even in stale-while-
    /// revalidate mode — a stale-but-within-window entry is still returned.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.config.enabled {
            self.record_miss();
            return None;
        }

        let now = Instant::now();
        let lookup = {
            let mut store = self.store.lock().unwrap();
            store.lookup(key, now, self.config.stale_window)
        };

        match lookup {
            Lookup::Fresh(v) | Lookup::Stale(v) => {
                self.record_hit();
                Some(v)
            }
            Lookup::Miss => {
                self.record_miss();
                None
            }
        }
    }

    /// Inserts `value` under `key`, expiring after `ttl`.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let expires_at = Instant::now() + ttl;
        let evicted = {
            let mut store = self.store.lock().unwrap();
            store.insert(key, value, expires_at)
        };

        if evicted.is_some() {
            self.config.event_listeners.emit(&CacheEvent::Eviction {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        }
    }

    /// Removes `key`, if present.
    pub fn delete(&self, key: &K) {
        self.store.lock().unwrap().remove(key);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.store.lock().unwrap().clear();
    }

    /// Looks up `key`; on a fresh hit, returns the cached value. On a stale
    /// hit (within `stale_window`), returns the stale value immediately and
    /// kicks off a background refresh if one isn't already running for this
    /// key. On a miss, runs `refresh` itself — coalesced with any other
    /// caller concurrently missing on the same key — and caches the result
    /// under `ttl` on success.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        refresh: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if !self.config.enabled {
            return refresh().await.map_err(|e| CacheError::Refresh(Arc::new(e)));
        }

        let now = Instant::now();
        let lookup = {
            let mut store = self.store.lock().unwrap();
            store.lookup(&key, now, self.config.stale_window)
        };

        match lookup {
            Lookup::Fresh(v) => {
                self.record_hit();
                Ok(v)
            }
            Lookup::Stale(v) => {
                self.record_hit();
                self.config.event_listeners.emit(&CacheEvent::StaleServed {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
                self.spawn_background_refresh(key, ttl, refresh);
                Ok(v)
            }
            Lookup::Miss => {
                self.record_miss();
                self.run_or_join(key, ttl, refresh).await
            }
        }
    }

    /// Stops the background sweeper. Safe to call more than once; further
    /// cache operations remain valid, they just stop being swept.
    pub fn shutdown(&self) {
        self.sweeper_cancel.cancel();
    }

    /// Total cache hits recorded so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that were hits, in `[0, 1]`. `0.0` if nothing has
    /// been looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let misses = self.misses() as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    fn spawn_background_refresh<F, Fut>(&self, key: K, ttl: Duration, refresh: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        {
            let inflight = self.inflight.lock().unwrap();
            if inflight.contains_key(&key) {
                return;
            }
        }

        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.run_or_join(key, ttl, refresh).await;
        });
    }

    /// Runs `refresh` if no refresh for `key` is already in flight,
    /// otherwise subscribes to the in-flight one's result. Only one refresh
    /// per key ever runs concurrently.
    async fn run_or_join<F, Fut>(&self, key: K, ttl: Duration, refresh: F) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let follower_rx = {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(tx) = inflight.get(&key) {
                Some(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                inflight.insert(key.clone(), tx);
                None
            }
        };

        if let Some(mut rx) = follower_rx {
            return match rx.recv().await {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(CacheError::Refresh(e)),
                Err(_) => Err(CacheError::LeaderLost),
            };
        }

        let outcome = refresh().await.map_err(Arc::new);

        if let Ok(v) = &outcome {
            let expires_at = Instant::now() + ttl;
            self.store.lock().unwrap().insert(key.clone(), v.clone(), expires_at);
        } else {
            self.config.event_listeners.emit(&CacheEvent::RefreshFailed {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        }

        let tx = self.inflight.lock().unwrap().remove(&key);
        if let Some(tx) = tx {
            let _ = tx.send(outcome.clone());
        }

        outcome.map_err(CacheError::Refresh)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.config.event_listeners.emit(&CacheEvent::Hit {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.config.event_listeners.emit(&CacheEvent::Miss {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[tokio::test]
    async fn set_then_get_is_a_hit() {
        let cache = CacheConfigBuilder::new().build::<String, String, std::io::Error>();
        cache.set("k".into(), "v".into(), Duration::from_secs(5));
        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let cache = CacheConfigBuilder::new().build::<String, String, std::io::Error>();
        assert_eq!(cache.get(&"nope".to_string()), None);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_lookup() {
        tokio::time::pause();
        let cache = CacheConfigBuilder::new().build::<String, String, std::io::Error>();
        cache.set("k".into(), "v".into(), Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = CacheConfigBuilder::new()
            .enabled(false)
            .build::<String, String, std::io::Error>();
        cache.set("k".into(), "v".into(), Duration::from_secs(5));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[tokio::test]
    async fn get_or_refresh_fetches_on_miss_and_caches() {
        let cache = CacheConfigBuilder::new().build::<String, String, std::io::Error>();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let v = cache
            .get_or_refresh("k".to_string(), Duration::from_secs(5), move || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, AtomicOrdering::SeqCst);
                    Ok::<_, std::io::Error>("fetched".to_string())
                }
            })
            .await
            .unwrap();
        assert_eq!(v, "fetched");
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(cache.get(&"k".to_string()), Some("fetched".to_string()));
    }

    #[tokio::test]
    async fn get_or_refresh_propagates_refresh_error() {
        let cache = CacheConfigBuilder::new().build::<String, String, &'static str>();
        let result = cache
            .get_or_refresh("k".to_string(), Duration::from_secs(5), || async {
                Err::<String, _>("boom")
            })
            .await;
        assert!(matches!(result, Err(CacheError::Refresh(e)) if *e == "boom"));
    }

    #[tokio::test]
    async fn stale_entry_served_while_refresh_runs_in_background() {
        tokio::time::pause();
        let cache = CacheConfigBuilder::new()
            .stale_window(Duration::from_secs(10))
            .build::<String, String, std::io::Error>();

        cache.set("k".into(), "old".into(), Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        let v = cache
            .get_or_refresh("k".to_string(), Duration::from_secs(5), || async {
                Ok::<_, std::io::Error>("new".to_string())
            })
            .await
            .unwrap();
        assert_eq!(v, "old");
    }

    #[tokio::test]
    async fn concurrent_misses_on_same_key_coalesce_to_one_fetch() {
        let cache = Arc::new(CacheConfigBuilder::new().build::<String, String, std::io::Error>());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh("k".to_string(), Duration::from_secs(5), move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, AtomicOrdering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, std::io::Error>("v".to_string())
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "v");
        }
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }
}
