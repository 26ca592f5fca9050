use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cache::CacheableQuery;
use crate::errors::MarketDataError;

/// Bar interval requested from a provider.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    OneMinute,
    OneHour,
    #[default]
    OneDay,
}

impl Interval {
    /// Short label used in logs and query descriptions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::OneMinute),
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            other => Err(MarketDataError::validation(format!(
                "Unknown interval '{}', expected 1m, 1h or 1d",
                other
            ))),
        }
    }
}

/// Historical quote query.
///
/// Only constructible through [`HistoryQuery::new`], so every instance that
/// reaches a fetcher is normalized: the symbol is trimmed and upper-cased
/// and `start <= end`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct HistoryQuery {
    symbol: String,
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
}

impl HistoryQuery {
    /// Build a normalized query.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::ValidationFailed`] when the symbol is blank
    /// or the range is inverted.
    pub fn new(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Self, MarketDataError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(MarketDataError::validation("symbol must not be empty"));
        }
        if symbol.chars().any(char::is_whitespace) {
            return Err(MarketDataError::validation(format!(
                "symbol '{}' must not contain whitespace",
                symbol
            )));
        }
        if start > end {
            return Err(MarketDataError::validation(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        Ok(Self {
            symbol,
            start,
            end,
            interval,
        })
    }

    /// Daily bars for `symbol` between `start` and `end`, inclusive.
    pub fn daily(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, MarketDataError> {
        Self::new(symbol, start, end, Interval::OneDay)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Number of calendar days covered by the range, inclusive.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for HistoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}..{} ({})",
            self.symbol, self.start, self.end, self.interval
        )
    }
}

impl CacheableQuery for HistoryQuery {
    fn namespace(&self) -> &'static str {
        "history"
    }
}
