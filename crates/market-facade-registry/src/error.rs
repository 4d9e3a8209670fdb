//! Errors raised by venue adapters and by the registry itself.

use thiserror::Error;

/// Opaque error surfaced by a venue adapter.
///
/// The registry and fallback chain only ever display or propagate this —
/// they never need to match on a venue's internal error shape, since venue
/// wire parsing and transport are external contracts (see `VenueAdapter`).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AdapterError(Box<dyn std::error::Error + Send + Sync>);

impl AdapterError {
    /// Wraps any error type an adapter implementation wants to surface.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }

    /// Wraps a plain message with no underlying error.
    pub fn msg(message: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);
        Self(Box::new(Message(message.into())))
    }
}

/// Errors raised by [`crate::VenueRegistry`] itself, as opposed to an
/// individual adapter's own failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `register` was called with a venue name already present.
    #[error("venue {0:?} is already registered")]
    DuplicateVenue(String),

    /// A query or lifecycle call named a venue the registry doesn't know.
    #[error("venue {0:?} is not registered")]
    UnknownVenue(String),

    /// `start` failed for this venue; every venue started before it has
    /// already been rolled back (best-effort `stop`) by the time this is
    /// returned.
    #[error("venue {venue:?} failed to start: {source}")]
    StartFailed {
        venue: String,
        #[source]
        source: AdapterError,
    },

    /// `stop` ran against every registered venue without short-circuiting;
    /// these are the ones that returned an error.
    #[error("{} venue(s) failed to stop cleanly", .0.len())]
    StopFailed(Vec<(String, AdapterError)>),

    /// An adapter call (fetch or health check) failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn adapter_error_displays_inner() {
        let err = AdapterError::new(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
        assert_eq!(err.to_string(), "timed out");
    }

    #[test]
    fn adapter_error_msg_has_no_source() {
        let err = AdapterError::msg("rate limited upstream");
        assert_eq!(err.to_string(), "rate limited upstream");
    }

    #[test]
    fn stop_failed_displays_count() {
        let err = RegistryError::StopFailed(vec![
            ("binance".into(), AdapterError::msg("timeout")),
            ("kraken".into(), AdapterError::msg("reset")),
        ]);
        assert_eq!(err.to_string(), "2 venue(s) failed to stop cleanly");
    }
}
