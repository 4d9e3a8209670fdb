//! Facade and per-venue configuration.
//!
//! `FacadeConfig` is a plain data structure; the facade does no file or
//! environment parsing itself (mirroring the registry's stance of not
//! owning an HTTP client) — callers build it directly or, with the
//! `config` feature, deserialize it with `serde`.

use std::time::Duration;

/// Top-level facade configuration: the set of venues to register plus
/// cross-cutting defaults.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct FacadeConfig {
    pub venues: Vec<NamedVenueConfig>,
    /// How often the registry polls each adapter's health check.
    #[cfg_attr(feature = "config", serde(default = "default_health_check_interval"))]
    pub health_check_interval: Duration,
    /// Upper bound on concurrent in-flight adapter calls per `_multi_venue`
    /// fan-out (spec §4.H).
    #[cfg_attr(feature = "config", serde(default = "default_fan_out_concurrency"))]
    pub fan_out_concurrency: usize,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            venues: Vec::new(),
            health_check_interval: default_health_check_interval(),
            fan_out_concurrency: default_fan_out_concurrency(),
        }
    }
}

/// A [`VenueConfig`] paired with the venue name it configures.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedVenueConfig {
    pub venue: String,
    #[cfg_attr(feature = "config", serde(flatten))]
    pub config: VenueConfig,
}

/// Settings for one venue's REST pipeline: rate limit, circuit breaker,
/// cache. Streaming has no separate config — `market-facade-stream`'s
/// `StreamConfig` already covers reconnect/backoff and is supplied directly
/// to the stream manager when a venue's stream adapter is registered.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct VenueConfig {
    pub base_url: String,
    pub ws_url: String,
    pub rate_limit_rps: f64,
    pub burst: u32,
    pub request_timeout: Duration,
    pub circuit: CircuitConfig,
    pub cache: VenueCacheConfig,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            ws_url: String::new(),
            rate_limit_rps: 10.0,
            burst: 20,
            request_timeout: Duration::from_secs(5),
            circuit: CircuitConfig::default(),
            cache: VenueCacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitConfig {
    pub enabled: bool,
    pub failure_threshold: f64,
    pub min_requests: usize,
    pub open_timeout: Duration,
    /// Accepted for config-shape parity; the underlying breaker opens on
    /// failure rate only, so an absolute-count trip condition isn't
    /// separately enforced (see DESIGN.md).
    pub probe_interval: Duration,
    pub max_failures: usize,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 0.5,
            min_requests: 10,
            open_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_secs(5),
            max_failures: 5,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct VenueCacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
    pub stale_window: Duration,
}

impl Default for VenueCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(2),
            max_entries: 10_000,
            stale_window: Duration::from_secs(3),
        }
    }
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_fan_out_concurrency() -> usize {
    5
}
