//! Configuration for the stream manager.

use crate::events::StreamEvent;
use crate::state::BackoffPolicy;
use market_facade_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::StreamManager`] instance.
pub struct StreamConfig {
    pub(crate) read_deadline: Duration,
    pub(crate) ping_interval: Duration,
    pub(crate) ping_write_deadline: Duration,
    pub(crate) subscribe_confirm_timeout: Duration,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) delivery_buffer: usize,
    pub(crate) event_listeners: EventListeners<StreamEvent>,
    pub(crate) name: String,
}

/// Builder for [`StreamConfig`].
pub struct StreamConfigBuilder {
    read_deadline: Duration,
    ping_interval: Duration,
    ping_write_deadline: Duration,
    subscribe_confirm_timeout: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    delivery_buffer: usize,
    event_listeners: EventListeners<StreamEvent>,
    name: String,
}

impl Default for StreamConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConfigBuilder {
    /// Creates a new builder with the defaults from spec §4.G: 60s read
    /// deadline, 30s ping interval with a 5s write deadline, 1s-to-30s
    /// exponential backoff, a 100-slot delivery buffer.
    pub fn new() -> Self {
        Self {
            read_deadline: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
            ping_write_deadline: Duration::from_secs(5),
            subscribe_confirm_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            delivery_buffer: 100,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// How long a read may block before the connection is considered dead.
    ///
    /// Default: 60 seconds
    pub fn read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// How often a ping frame is written on an established connection.
    ///
    /// Default: 30 seconds
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// How long a ping write may take before it's treated as a failure.
    ///
    /// Default: 5 seconds
    pub fn ping_write_deadline(mut self, deadline: Duration) -> Self {
        self.ping_write_deadline = deadline;
        self
    }

    /// How long `subscribe` waits for the venue's confirmation frame.
    ///
    /// Default: 5 seconds
    pub fn subscribe_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_confirm_timeout = timeout;
        self
    }

    /// Sets the initial and maximum reconnect backoff delays.
    ///
    /// Default: 1 second initial, 30 second cap
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Sets the per-subscription delivery channel buffer size.
    ///
    /// Default: 100
    pub fn delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity;
        self
    }

    /// Gives this stream manager a human-readable name for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for connection state-change events.
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &StreamEvent| {
            if let StreamEvent::Connected { venue, .. } = event {
                f(venue);
            }
        }));
        self
    }

    /// Registers a callback fired whenever a reconnect backoff is scheduled.
    pub fn on_backoff<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &StreamEvent| {
            if let StreamEvent::BackoffScheduled { venue, delay, .. } = event {
                f(venue, *delay);
            }
        }));
        self
    }

    fn build_config(self) -> StreamConfig {
        StreamConfig {
            read_deadline: self.read_deadline,
            ping_interval: self.ping_interval,
            ping_write_deadline: self.ping_write_deadline,
            subscribe_confirm_timeout: self.subscribe_confirm_timeout,
            backoff: BackoffPolicy::new(self.initial_backoff, self.max_backoff),
            delivery_buffer: self.delivery_buffer,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the stream manager.
    pub fn build(self) -> crate::StreamManager {
        crate::StreamManager::from_config(self.build_config())
    }
}
