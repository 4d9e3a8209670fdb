//! The facade's unified error type.
//!
//! Every error kind in the system — from a rejected rate-limit wait down to
//! an aggregate fallback failure — is normalized into one `FacadeError` so
//! callers never need to match on a per-component error type.

use market_facade_fallback::FallbackError;
use market_facade_registry::{AdapterError, RegistryError};
use market_facade_stream::StreamError;

/// A boxed, type-erased cause, carried by most [`FacadeError`] variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong calling through the facade.
///
/// Each variant carries `{venue, endpoint, message, cause}` per the error
/// kind table: `venue`/`endpoint` are `None` when the failure isn't
/// attributable to one (e.g. a pre-flight symbol rejection has a venue but
/// no endpoint yet; a shutdown-time error may have neither).
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// The token bucket denied the request after `max_wait_timeout` elapsed.
    /// Retriable.
    #[error("rate limited calling {venue}/{endpoint}: {message}")]
    RateLimited {
        venue: String,
        endpoint: String,
        message: String,
    },

    /// The circuit breaker rejected the call without invoking the adapter.
    /// Not retried locally — the fallback chain, if used, tries the next venue.
    #[error("circuit open for {venue}/{endpoint}")]
    CircuitOpen { venue: String, endpoint: String },

    /// The request's deadline elapsed. Retriable.
    #[error("timeout calling {venue}/{endpoint}: {message}")]
    Timeout {
        venue: String,
        endpoint: String,
        message: String,
    },

    /// A transport-level failure talking to the venue. Counted as a circuit
    /// breaker failure. Retriable.
    #[error("network error calling {venue}/{endpoint}: {message}")]
    NetworkError {
        venue: String,
        endpoint: String,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// The venue responded with a non-success status. Retriable iff
    /// `status >= 500`.
    #[error("{venue}/{endpoint} returned status {status}: {message}")]
    ApiError {
        venue: String,
        endpoint: String,
        status: u16,
        message: String,
    },

    /// A response failed to parse, or violated a canonical invariant (e.g.
    /// `best_bid >= best_ask`). Never counted as a circuit breaker failure —
    /// a malformed payload says nothing about the venue's liveness.
    #[error("invalid data from {venue}/{endpoint}: {message}")]
    InvalidData {
        venue: String,
        endpoint: String,
        message: String,
    },

    /// The requested symbol was rejected before any venue was contacted
    /// (malformed, or a non-USD quote under the domain's USD constraint).
    #[error("invalid symbol: {message}")]
    InvalidSymbol { message: String },

    /// The venue doesn't support the requested data type. Not a failure.
    #[error("{venue} does not support {endpoint}")]
    Unsupported { venue: String, endpoint: String },

    /// The caller's context was canceled. Not counted anywhere.
    #[error("operation canceled")]
    Canceled,

    /// Every venue in a fallback chain failed.
    #[error(transparent)]
    AggregateFailure(#[from] FallbackError),

    /// A registry-level failure (duplicate/unknown venue, start/stop failure).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A stream-manager failure (unknown venue, subscribe rejected/timed out).
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl FacadeError {
    pub fn venue(&self) -> Option<&str> {
        match self {
            Self::RateLimited { venue, .. }
            | Self::CircuitOpen { venue, .. }
            | Self::Timeout { venue, .. }
            | Self::NetworkError { venue, .. }
            | Self::ApiError { venue, .. }
            | Self::InvalidData { venue, .. }
            | Self::Unsupported { venue, .. } => Some(venue),
            _ => None,
        }
    }

    /// Whether the circuit breaker should count this outcome as a failure,
    /// per the §7 propagation table (`InvalidData` is deliberately exempt —
    /// a malformed payload doesn't mean the venue is down).
    pub fn counts_as_breaker_failure(&self) -> bool {
        !matches!(
            self,
            Self::InvalidData { .. } | Self::InvalidSymbol { .. } | Self::Unsupported { .. } | Self::Canceled
        )
    }

    pub(crate) fn from_adapter_error(venue: &str, endpoint: &str, err: AdapterError) -> Self {
        Self::NetworkError {
            venue: venue.to_string(),
            endpoint: endpoint.to_string(),
            message: err.to_string(),
            cause: Some(Box::new(err)),
        }
    }
}

