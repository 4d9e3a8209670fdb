use chrono::{DateTime, Utc};
use std::time::Duration;

/// Metadata describing where and when a piece of market data originated.
///
/// Every canonical type in this crate carries one, so a consumer reading a
/// merged or cached value can always trace it back to the venue, endpoint
/// and moment it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Provenance {
    /// How the data was sourced, e.g. `"exchange_native"` for a direct
    /// venue API call versus some aggregated or synthesized source.
    pub source_type: String,
    /// The venue identifier the data came from, e.g. `"kraken"`.
    pub venue: String,
    /// The adapter endpoint/operation that produced this payload, e.g.
    /// `"order_book"`. Empty until stamped by the caller that knows it.
    pub endpoint: String,
    /// Round-trip time of the call that produced this payload, if known.
    pub latency: Option<Duration>,
    /// A venue-supplied integrity checksum over the payload, if any.
    pub checksum: Option<String>,
    /// When the venue produced this data, if known.
    pub venue_timestamp: Option<DateTime<Utc>>,
    /// When this facade observed the data.
    pub observed_at: DateTime<Utc>,
    /// Whether this value was served from cache rather than fetched live.
    pub from_cache: bool,
}

impl Provenance {
    pub fn live(venue: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            source_type: "exchange_native".to_string(),
            venue: venue.into(),
            endpoint: String::new(),
            latency: None,
            checksum: None,
            venue_timestamp: None,
            observed_at,
            from_cache: false,
        }
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_venue_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.venue_timestamp = Some(ts);
        self
    }

    pub fn as_cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
