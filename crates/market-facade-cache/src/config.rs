//! Configuration for the cache.

use crate::events::CacheEvent;
use market_facade_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::Cache`] instance.
pub struct CacheConfig {
    pub(crate) capacity: usize,
    pub(crate) default_ttl: Duration,
    pub(crate) stale_window: Option<Duration>,
    pub(crate) sweep_interval: Duration,
    pub(crate) enabled: bool,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    capacity: usize,
    default_ttl: Duration,
    stale_window: Option<Duration>,
    sweep_interval: Option<Duration>,
    enabled: bool,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            capacity: 1_000,
            default_ttl: Duration::from_secs(5),
            stale_window: None,
            sweep_interval: None,
            enabled: true,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the maximum number of entries held at once.
    ///
    /// Default: 1000
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the TTL applied when a caller doesn't specify one explicitly on
    /// `set`/`get_or_refresh`.
    ///
    /// Default: 5 seconds
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables stale-while-revalidate: an entry found expired but within
    /// `window` of its `expires_at` is still served, with a background
    /// refresh kicked off (at most one in flight per key).
    ///
    /// Default: disabled (expired entries are always a miss)
    pub fn stale_window(mut self, window: Duration) -> Self {
        self.stale_window = Some(window);
        self
    }

    /// Sets the interval at which the background sweeper scans for expired
    /// entries.
    ///
    /// Default: half of `default_ttl`
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Enables or disables the cache. When disabled, every operation is a
    /// no-op and every read reports a miss.
    ///
    /// Default: true
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Gives this cache a human-readable name for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for cache-hit events.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for cache-miss events.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for eviction events.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Eviction { .. }) {
                f();
            }
        }));
        self
    }

    fn build_config(self) -> CacheConfig {
        let sweep_interval = self
            .sweep_interval
            .unwrap_or_else(|| self.default_ttl / 2);

        CacheConfig {
            capacity: self.capacity,
            default_ttl: self.default_ttl,
            stale_window: self.stale_window,
            sweep_interval,
            enabled: self.enabled,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the cache and starts its background sweeper task.
    pub fn build<K, V, E>(self) -> crate::Cache<K, V, E>
    where
        K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        crate::Cache::from_config(self.build_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_defaults() {
        let _cache = CacheConfigBuilder::new().build::<String, String, std::io::Error>();
    }

    #[tokio::test]
    async fn builder_custom_values() {
        let _cache = CacheConfigBuilder::new()
            .capacity(50)
            .default_ttl(Duration::from_secs(30))
            .stale_window(Duration::from_secs(10))
            .name("order-book-cache")
            .build::<String, String, std::io::Error>();
    }

    #[test]
    fn sweep_interval_defaults_to_half_ttl() {
        let config = CacheConfigBuilder::new()
            .default_ttl(Duration::from_secs(10))
            .build_config();
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }
}
