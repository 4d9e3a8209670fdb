use crate::provenance::Provenance;
use crate::symbol::CanonicalSymbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trade {
    pub symbol: CanonicalSymbol,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub traded_at: DateTime<Utc>,
    /// Venue-assigned trade id, when the venue provides one.
    pub trade_id: Option<String>,
    pub provenance: Provenance,
}
