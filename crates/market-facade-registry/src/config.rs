//! Configuration for the venue registry's health-check supervisor.

use crate::events::RegistryEvent;
use crate::HealthStatus;
use market_facade_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::VenueRegistry`].
#[derive(Clone)]
pub struct RegistryConfig {
    pub(crate) health_check_interval: Duration,
    pub(crate) health_check_timeout: Duration,
    pub(crate) initial_delay: Duration,
    pub(crate) min_success_rate: f64,
    pub(crate) failure_threshold: u32,
    pub(crate) event_listeners: EventListeners<RegistryEvent>,
    pub(crate) name: String,
}

/// Builder for [`RegistryConfig`].
pub struct RegistryConfigBuilder {
    health_check_interval: Duration,
    health_check_timeout: Duration,
    initial_delay: Duration,
    min_success_rate: f64,
    failure_threshold: u32,
    event_listeners: EventListeners<RegistryEvent>,
    name: String,
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(2),
            initial_delay: Duration::from_millis(500),
            min_success_rate: 0.5,
            failure_threshold: 2,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Interval between supervisor health-check sweeps.
    ///
    /// Default: 30 seconds
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Per-venue deadline for a single `health_check` call before it's
    /// treated as a failure.
    ///
    /// Default: 2 seconds
    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// Delay before the first sweep after `start`.
    ///
    /// Default: 500 milliseconds
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Minimum running success rate (successful/total checks) required for
    /// a started venue with a short failure streak to count as Healthy
    /// rather than Degraded.
    ///
    /// Default: 0.5
    pub fn min_success_rate(mut self, rate: f64) -> Self {
        self.min_success_rate = rate;
        self
    }

    /// Consecutive failed checks required to mark a venue Unhealthy.
    ///
    /// Default: 2
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Gives this registry a human-readable name for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback fired whenever a venue's health status changes.
    pub fn on_health_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, HealthStatus, HealthStatus) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &RegistryEvent| {
            if let RegistryEvent::HealthChanged { venue, from, to, .. } = event {
                f(venue, *from, *to);
            }
        }));
        self
    }

    fn build_config(self) -> RegistryConfig {
        RegistryConfig {
            health_check_interval: self.health_check_interval,
            health_check_timeout: self.health_check_timeout,
            initial_delay: self.initial_delay,
            min_success_rate: self.min_success_rate,
            failure_threshold: self.failure_threshold,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the registry. The supervisor loop does not start until
    /// [`crate::VenueRegistry::start`] is called.
    pub fn build(self) -> crate::VenueRegistry {
        crate::VenueRegistry::from_config(self.build_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let registry = RegistryConfigBuilder::new().build();
        assert_eq!(registry.config().health_check_interval, Duration::from_secs(30));
        assert_eq!(registry.config().failure_threshold, 2);
    }

    #[test]
    fn builder_custom_values() {
        let registry = RegistryConfigBuilder::new()
            .health_check_interval(Duration::from_secs(10))
            .health_check_timeout(Duration::from_secs(1))
            .min_success_rate(0.75)
            .failure_threshold(5)
            .name("venues")
            .build();

        let config = registry.config();
        assert_eq!(config.health_check_interval, Duration::from_secs(10));
        assert_eq!(config.health_check_timeout, Duration::from_secs(1));
        assert_eq!(config.min_success_rate, 0.75);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.name, "venues");
    }
}
