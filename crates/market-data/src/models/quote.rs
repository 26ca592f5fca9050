use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market data quote
///
/// Decimals are serialized as strings so a cached quote reads back equal to
/// the one the provider produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol as requested (normalized)
    pub symbol: String,

    /// Timestamp of the quote
    pub timestamp: DateTime<Utc>,

    /// Opening price (optional for intraday)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub open: Option<Decimal>,

    /// High price (optional for intraday)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub high: Option<Decimal>,

    /// Low price (optional for intraday)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub low: Option<Decimal>,

    /// Closing/current price (required)
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,

    /// Trading volume (optional)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub volume: Option<Decimal>,

    /// Quote currency
    pub currency: String,

    /// Source of the quote (VCI, YAHOO, ...)
    pub source: String,
}

impl Quote {
    /// Create a new quote with minimal required fields
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        close: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            currency: currency.into(),
            source: source.into(),
        }
    }

    /// Attach OHLC and volume to a quote.
    pub fn with_ohlcv(
        mut self,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Decimal,
    ) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.volume = Some(volume);
        self
    }

    /// Basic sanity check applied by fetchers before a record is accepted.
    ///
    /// Rejects non-positive closes and highs below lows.
    pub fn is_consistent(&self) -> bool {
        if self.close <= Decimal::ZERO {
            return false;
        }
        match (self.high, self.low) {
            (Some(high), Some(low)) => high >= low,
            _ => true,
        }
    }
}
