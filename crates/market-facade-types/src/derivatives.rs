use crate::provenance::Provenance;
use crate::symbol::CanonicalSymbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A perpetual/futures funding rate observation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FundingRate {
    pub symbol: CanonicalSymbol,
    pub rate: Decimal,
    pub next_funding_time: Option<DateTime<Utc>>,
    /// The venue's current mark price, when it reports one alongside funding.
    pub mark_price: Option<Decimal>,
    /// The venue's current index price, when it reports one alongside funding.
    pub index_price: Option<Decimal>,
    pub provenance: Provenance,
}

/// Open interest for a derivatives instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenInterest {
    pub symbol: CanonicalSymbol,
    /// Open interest denominated in the base asset.
    pub amount: Decimal,
    /// Open interest converted to USD, when the venue provides a conversion.
    pub oi_usd: Option<Decimal>,
    pub provenance: Provenance,
}
