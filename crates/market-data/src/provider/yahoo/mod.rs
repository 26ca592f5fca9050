//! Yahoo Finance history fetcher, used as the secondary source.
//!
//! Vietnamese listings are addressed with an exchange suffix
//! (`VNM` -> `VNM.VN`); the suffix is configurable.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::fetcher::Fetcher;
use crate::models::{HistoryQuery, Quote};

const PROVIDER_ID: &str = "YAHOO";
const DEFAULT_SUFFIX: &str = ".VN";
const DEFAULT_CURRENCY: &str = "VND";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Yahoo fetcher settings.
#[derive(Clone, Debug, PartialEq)]
pub struct YahooConfig {
    /// Appended to every symbol.
    pub suffix: String,
    /// Currency the suffixed listings trade in.
    pub currency: String,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Provider request: ticker plus a half-open time range.
#[derive(Clone, Debug, PartialEq)]
pub struct YahooRequest {
    pub ticker: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub interval: &'static str,
}

pub struct YahooFetcher {
    connector: yahoo::YahooConnector,
    config: YahooConfig,
}

impl YahooFetcher {
    pub fn new(config: YahooConfig) -> Result<Self, MarketDataError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to initialize Yahoo connector: {}", e),
            })?;
        Ok(Self { connector, config })
    }

    pub fn ticker_for(&self, symbol: &str) -> String {
        if self.config.suffix.is_empty() || symbol.ends_with(&self.config.suffix) {
            symbol.to_string()
        } else {
            format!("{}{}", symbol, self.config.suffix)
        }
    }

    fn midnight(date: NaiveDate) -> Result<OffsetDateTime, MarketDataError> {
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| MarketDataError::validation(format!("invalid date {}", date)))?;
        OffsetDateTime::from_unix_timestamp(timestamp)
            .map_err(|e| MarketDataError::validation(format!("date {} out of range: {}", date, e)))
    }

    fn yahoo_quote_to_quote(&self, query: &HistoryQuery, yahoo_quote: &yahoo::Quote) -> Option<Quote> {
        let timestamp = Utc
            .timestamp_opt(yahoo_quote.timestamp as i64, 0)
            .single()?;
        let date = timestamp.date_naive();
        if date < query.start() || date > query.end() {
            return None;
        }

        let close = Decimal::from_f64_retain(yahoo_quote.close)?;
        let quote = Quote::new(
            query.symbol(),
            timestamp,
            close,
            self.config.currency.as_str(),
            PROVIDER_ID,
        )
        .with_ohlcv(
            Decimal::from_f64_retain(yahoo_quote.open)?,
            Decimal::from_f64_retain(yahoo_quote.high)?,
            Decimal::from_f64_retain(yahoo_quote.low)?,
            Decimal::from_u64(yahoo_quote.volume)?,
        );

        quote.is_consistent().then_some(quote)
    }
}

#[async_trait]
impl Fetcher for YahooFetcher {
    type Query = HistoryQuery;
    type Request = YahooRequest;
    type Record = yahoo::Quote;
    type Output = Quote;

    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn transform_query(&self, query: &HistoryQuery) -> Result<YahooRequest, MarketDataError> {
        let day_after = query
            .end()
            .succ_opt()
            .ok_or_else(|| MarketDataError::validation("end date out of range"))?;

        Ok(YahooRequest {
            ticker: self.ticker_for(query.symbol()),
            start: Self::midnight(query.start())?,
            end: Self::midnight(day_after)?,
            interval: query.interval().as_str(),
        })
    }

    async fn extract_data(&self, request: YahooRequest) -> Result<Vec<yahoo::Quote>, MarketDataError> {
        debug!(
            "Fetching {} history for {} from Yahoo",
            request.interval, request.ticker
        );

        let call = self.connector.get_quote_history_interval(
            &request.ticker,
            request.start,
            request.end,
            request.interval,
        );
        let response = tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| MarketDataError::Timeout {
                provider: PROVIDER_ID.to_string(),
            })?
            .map_err(|e| {
                if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
                    MarketDataError::SymbolNotFound(request.ticker.clone())
                } else {
                    MarketDataError::ProviderError {
                        provider: PROVIDER_ID.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        match response.quotes() {
            Ok(quotes) => Ok(quotes),
            Err(yahoo::YahooError::NoQuotes) => Ok(Vec::new()),
            Err(e) => Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn transform_data(&self, query: &HistoryQuery, records: Vec<yahoo::Quote>) -> Vec<Quote> {
        let total = records.len();
        let quotes: Vec<Quote> = records
            .iter()
            .filter_map(|q| self.yahoo_quote_to_quote(query, q))
            .collect();

        if quotes.len() < total {
            warn!(
                "Yahoo: skipped {} of {} quotes for {}",
                total - quotes.len(),
                total,
                query
            );
        }
        quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fetcher() -> YahooFetcher {
        YahooFetcher::new(YahooConfig::default()).unwrap()
    }

    fn query() -> HistoryQuery {
        HistoryQuery::daily(
            "VNM",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    fn yahoo_quote(timestamp: u64, close: f64) -> yahoo::Quote {
        yahoo::Quote {
            timestamp: timestamp as _,
            open: close,
            high: close + 500.0,
            low: close - 500.0,
            volume: 1_000,
            close,
            adjclose: close,
        }
    }

    #[test]
    fn test_ticker_suffix() {
        let fetcher = fetcher();
        assert_eq!(fetcher.ticker_for("VNM"), "VNM.VN");
        assert_eq!(fetcher.ticker_for("VNM.VN"), "VNM.VN");
    }

    #[test]
    fn test_transform_query_covers_end_day() {
        let request = fetcher().transform_query(&query()).unwrap();

        assert_eq!(request.ticker, "VNM.VN");
        assert_eq!(request.interval, "1d");
        assert_eq!(request.start.unix_timestamp(), 1_704_067_200);
        // 2024-02-01T00:00:00Z, exclusive
        assert_eq!(request.end.unix_timestamp(), 1_706_745_600);
    }

    #[test]
    fn test_transform_data() {
        let records = vec![
            yahoo_quote(1_704_153_600, 67_000.0),
            yahoo_quote(1_706_832_000, 68_000.0),
            yahoo_quote(1_704_240_000, -1.0),
        ];

        let quotes = fetcher().transform_data(&query(), records);

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].close, dec!(67000));
        assert_eq!(quotes[0].currency, "VND");
        assert_eq!(quotes[0].source, "YAHOO");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_vn_history() {
        let quotes = fetcher().try_fetch(&query()).await.unwrap();
        assert!(!quotes.is_empty());
    }
}
