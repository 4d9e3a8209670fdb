//! Shared infrastructure for the market-facade reliability crates.
//!
//! Every pattern crate (rate limiter, circuit breaker, cache, registry,
//! fallback chain, stream manager) builds on the same event system for
//! observability: a `ResilienceEvent` trait, a listener registry, and a
//! function-based listener adapter.

pub mod domain;
pub mod events;

pub use domain::DataType;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
