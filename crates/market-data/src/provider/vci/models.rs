//! Wire types for the Vietcap chart API.

use serde::{Deserialize, Serialize};

use crate::models::Interval;

/// Request payload for OHLC chart data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VciHistoryRequest {
    pub time_frame: &'static str,
    pub symbols: Vec<String>,
    /// End of range, Unix seconds.
    pub to: i64,
    pub count_back: i64,
}

/// Raw OHLC response (column arrays, one entry per bar).
/// The API may return timestamps as strings, hence the custom deserializer.
#[derive(Debug, Clone, Deserialize)]
pub struct VciOhlcResponse {
    #[serde(default)]
    pub symbol: Option<String>,
    /// Timestamps (Unix seconds)
    #[serde(deserialize_with = "deserialize_timestamps")]
    pub t: Vec<i64>,
    /// Prices in thousands of VND
    #[serde(default)]
    pub o: Vec<f64>,
    #[serde(default)]
    pub h: Vec<f64>,
    #[serde(default)]
    pub l: Vec<f64>,
    #[serde(default)]
    pub c: Vec<f64>,
    #[serde(default)]
    pub v: Vec<i64>,
}

impl VciOhlcResponse {
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Split the column arrays into rows. Columns shorter than `t` leave
    /// holes that the transform step rejects.
    pub fn into_bars(self) -> Vec<VciBar> {
        (0..self.t.len())
            .map(|i| VciBar {
                timestamp: self.t[i],
                open: self.o.get(i).copied(),
                high: self.h.get(i).copied(),
                low: self.l.get(i).copied(),
                close: self.c.get(i).copied(),
                volume: self.v.get(i).copied(),
            })
            .collect()
    }
}

/// One bar as returned by the API, prices unscaled.
#[derive(Clone, Debug, PartialEq)]
pub struct VciBar {
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

fn deserialize_timestamps<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = Vec<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of timestamps (either strings or integers)")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut timestamps = Vec::with_capacity(seq.size_hint().unwrap_or(0));

            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                let ts = match value {
                    serde_json::Value::Number(n) => n
                        .as_i64()
                        .ok_or_else(|| de::Error::custom("invalid timestamp number"))?,
                    serde_json::Value::String(s) => s.parse::<i64>().map_err(|_| {
                        de::Error::custom(format!("invalid timestamp string: {}", s))
                    })?,
                    _ => return Err(de::Error::custom("expected number or string for timestamp")),
                };
                timestamps.push(ts);
            }

            Ok(timestamps)
        }
    }

    deserializer.deserialize_seq(TimestampVisitor)
}

/// API value for an interval.
pub fn time_frame(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "ONE_MINUTE",
        Interval::OneHour => "ONE_HOUR",
        Interval::OneDay => "ONE_DAY",
    }
}

/// Bars to ask for so that `days` calendar days are covered.
pub fn count_back(interval: Interval, days: i64) -> i64 {
    match interval {
        Interval::OneDay => days,
        // ~7 trading hours per day
        Interval::OneHour => days * 7,
        // 390 minutes per trading day
        Interval::OneMinute => days * 390,
    }
}

/// Index codes differ from their display names on this API.
pub fn map_index_symbol(symbol: &str) -> Option<&'static str> {
    match symbol {
        "VNINDEX" => Some("VNINDEX"),
        "HNXINDEX" => Some("HNXIndex"),
        "UPCOMINDEX" => Some("HNXUpcomIndex"),
        _ => None,
    }
}
