//! Offline fetcher over CSV exports, one file per symbol.
//!
//! Files live at `{dir}/{SYMBOL}.csv` with a header row
//! `date,open,high,low,close,volume`. Parsing is synchronous, so reads run
//! on the [`BlockingPool`] under a timeout.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::fetcher::{BlockingPool, Fetcher};
use crate::models::{HistoryQuery, Interval, Quote};

const PROVIDER_ID: &str = "CSV";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// CSV source settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvConfig {
    pub dir: PathBuf,
    pub currency: String,
    pub timeout: Duration,
    /// Files parsed at once.
    pub max_concurrency: usize,
}

impl CsvConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            currency: "VND".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_concurrency: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CsvRequest {
    pub symbol: String,
    pub path: PathBuf,
}

/// One row as written in the file. Every column is kept as text so a bad
/// cell only loses its own row.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CsvRow {
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

pub struct CsvFetcher {
    config: CsvConfig,
    pool: BlockingPool,
}

impl CsvFetcher {
    pub fn new(config: CsvConfig) -> Self {
        let pool = BlockingPool::new(config.max_concurrency);
        Self { config, pool }
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    fn read_rows(request: &CsvRequest) -> Result<Vec<CsvRow>, MarketDataError> {
        let file = File::open(&request.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MarketDataError::SymbolNotFound(request.symbol.clone()),
            _ => MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Cannot open {}: {}", request.path.display(), e),
            },
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => debug!(
                    "CSV: unreadable row {} in {}: {}",
                    line + 2,
                    request.path.display(),
                    e
                ),
            }
        }
        Ok(rows)
    }

    fn parse_decimal(cell: &str) -> Option<Decimal> {
        cell.parse::<Decimal>().ok()
    }

    fn row_to_quote(&self, query: &HistoryQuery, row: &CsvRow) -> Option<Quote> {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").ok()?;
        if date < query.start() || date > query.end() {
            return None;
        }

        let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc();
        let quote = Quote::new(
            query.symbol(),
            timestamp,
            Self::parse_decimal(&row.close)?,
            self.config.currency.as_str(),
            PROVIDER_ID,
        )
        .with_ohlcv(
            Self::parse_decimal(&row.open)?,
            Self::parse_decimal(&row.high)?,
            Self::parse_decimal(&row.low)?,
            Self::parse_decimal(&row.volume)?,
        );

        quote.is_consistent().then_some(quote)
    }
}

#[async_trait]
impl Fetcher for CsvFetcher {
    type Query = HistoryQuery;
    type Request = CsvRequest;
    type Record = CsvRow;
    type Output = Quote;

    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn transform_query(&self, query: &HistoryQuery) -> Result<CsvRequest, MarketDataError> {
        if query.interval() != Interval::OneDay {
            return Err(MarketDataError::validation(format!(
                "CSV exports only hold daily bars, got {}",
                query.interval()
            )));
        }

        let symbol = query.symbol().to_string();
        let path = self.config.dir.join(format!("{}.csv", symbol));
        Ok(CsvRequest { symbol, path })
    }

    async fn extract_data(&self, request: CsvRequest) -> Result<Vec<CsvRow>, MarketDataError> {
        debug!("CSV: reading {}", request.path.display());

        let job = self
            .pool
            .run(PROVIDER_ID, move || Self::read_rows(&request));
        tokio::time::timeout(self.config.timeout, job)
            .await
            .map_err(|_| MarketDataError::Timeout {
                provider: PROVIDER_ID.to_string(),
            })?
    }

    fn transform_data(&self, query: &HistoryQuery, records: Vec<CsvRow>) -> Vec<Quote> {
        let total = records.len();
        let mut quotes: Vec<Quote> = records
            .iter()
            .filter_map(|row| self.row_to_quote(query, row))
            .collect();
        quotes.sort_by_key(|q| q.timestamp);

        let skipped = total - quotes.len();
        if skipped > 0 {
            warn!(
                "CSV: skipped {} of {} rows for {} (malformed or out of range)",
                skipped, total, query
            );
        }
        quotes
    }
}
