//! The venue adapter registry.
//!
//! Owns every [`VenueAdapter`] by its unique venue name, starts and stops
//! them as a unit (fail-fast with rollback on `start`, collect-errors on
//! `stop`), and runs a background supervisor loop that periodically calls
//! each adapter's `health_check` and keeps a [`HealthRecord`] current for it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use market_facade_registry::VenueRegistry;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(adapter: Arc<dyn market_facade_registry::VenueAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = VenueRegistry::builder()
//!     .health_check_interval(Duration::from_secs(30))
//!     .build();
//!
//! registry.register(adapter).await?;
//!
//! let ctx = CancellationToken::new();
//! registry.start(ctx.clone()).await?;
//!
//! for venue in registry.get_healthy().await {
//!     println!("healthy venue: {}", venue.venue());
//! }
//!
//! registry.stop(ctx).await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod error;
mod events;
mod health;
mod registry;

pub use adapter::{VenueAdapter, VenueLimits};
pub use config::{RegistryConfig, RegistryConfigBuilder};
pub use error::{AdapterError, RegistryError};
pub use events::RegistryEvent;
pub use health::HealthRecord;
pub use registry::VenueRegistry;

/// Health status of a monitored venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The venue is healthy and ready to serve calls.
    Healthy,

    /// The venue is degraded but still usable (e.g. slow but responding).
    Degraded,

    /// The venue should not be used.
    Unhealthy,

    /// Not yet checked, or the last check's outcome was inconclusive.
    Unknown,
}

impl HealthStatus {
    /// Whether the status indicates the venue is usable (Healthy or Degraded).
    pub fn is_usable(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    /// Whether the status indicates the venue is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
