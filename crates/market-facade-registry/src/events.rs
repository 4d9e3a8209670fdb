//! Observability events for the venue registry.

use crate::HealthStatus;
use market_facade_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`crate::VenueRegistry`].
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    VenueRegistered {
        venue: String,
        timestamp: Instant,
    },
    VenueStarted {
        venue: String,
        timestamp: Instant,
    },
    VenueStartFailed {
        venue: String,
        timestamp: Instant,
    },
    VenueStopped {
        venue: String,
        timestamp: Instant,
    },
    HealthChanged {
        venue: String,
        from: HealthStatus,
        to: HealthStatus,
        timestamp: Instant,
    },
    HealthCheckTimedOut {
        venue: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::VenueRegistered { .. } => "venue_registered",
            RegistryEvent::VenueStarted { .. } => "venue_started",
            RegistryEvent::VenueStartFailed { .. } => "venue_start_failed",
            RegistryEvent::VenueStopped { .. } => "venue_stopped",
            RegistryEvent::HealthChanged { .. } => "health_changed",
            RegistryEvent::HealthCheckTimedOut { .. } => "health_check_timed_out",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RegistryEvent::VenueRegistered { timestamp, .. }
            | RegistryEvent::VenueStarted { timestamp, .. }
            | RegistryEvent::VenueStartFailed { timestamp, .. }
            | RegistryEvent::VenueStopped { timestamp, .. }
            | RegistryEvent::HealthChanged { timestamp, .. }
            | RegistryEvent::HealthCheckTimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RegistryEvent::VenueRegistered { venue, .. }
            | RegistryEvent::VenueStarted { venue, .. }
            | RegistryEvent::VenueStartFailed { venue, .. }
            | RegistryEvent::VenueStopped { venue, .. }
            | RegistryEvent::HealthChanged { venue, .. }
            | RegistryEvent::HealthCheckTimedOut { venue, .. } => venue,
        }
    }
}
