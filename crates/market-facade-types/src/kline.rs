use crate::error::DataError;
use crate::provenance::Provenance;
use crate::symbol::CanonicalSymbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Candle interval, the set every adapter is expected to support mapping
/// onto its own wire-format interval strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

/// An OHLC candle for a fixed time bucket.
///
/// Construction enforces `low <= open, close <= high` and
/// `open_time < close_time`; a candle that fails either is a sign the
/// venue sent corrupt data, not that the venue is down.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kline {
    pub symbol: CanonicalSymbol,
    pub interval: Interval,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Number of individual trades that make up this candle, when the venue
    /// reports it.
    pub trade_count: Option<u64>,
    pub provenance: Provenance,
}

impl Kline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: CanonicalSymbol,
        interval: Interval,
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        trade_count: Option<u64>,
        provenance: Provenance,
    ) -> Result<Self, DataError> {
        if open_time >= close_time {
            return Err(DataError::InvariantViolation(
                "open_time must precede close_time".to_string(),
            ));
        }
        if low > open || low > close || high < open || high < close {
            return Err(DataError::InvariantViolation(
                "low/high do not bound open/close".to_string(),
            ));
        }

        Ok(Self {
            symbol,
            interval,
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            trade_count,
            provenance,
        })
    }
}
