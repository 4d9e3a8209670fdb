//! Canonical, venue-agnostic market-data model.
//!
//! Every adapter produces these types and nothing else, so the rest of the
//! facade (cache, fallback chain, orchestrator) never needs to know which
//! venue a value came from to reason about it.

pub mod derivatives;
pub mod error;
pub mod kline;
pub mod orderbook;
pub mod provenance;
pub mod symbol;
pub mod trade;

pub use derivatives::{FundingRate, OpenInterest};
pub use error::DataError;
pub use kline::{Interval, Kline};
pub use orderbook::{OrderBookSnapshot, PriceLevel};
pub use provenance::Provenance;
pub use symbol::{CanonicalSymbol, VenueSymbolMap};
pub use trade::{Side, Trade};
