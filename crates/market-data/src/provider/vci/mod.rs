//! Vietcap (VCI) chart API fetcher for Vietnamese stocks and indices.
//!
//! Prices come back in thousands of VND and are scaled to VND here.
//! Timestamps may be strings or integers depending on the endpoint
//! version; both are accepted.

mod models;

pub use models::{VciBar, VciHistoryRequest, VciOhlcResponse};

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use log::{debug, warn};
use num_traits::FromPrimitive;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::fetcher::Fetcher;
use crate::models::{HistoryQuery, Quote};

const PROVIDER_ID: &str = "VCI";
const DEFAULT_BASE_URL: &str = "https://trading.vietcap.com.vn/api";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CURRENCY: &str = "VND";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";

/// VCI client settings.
#[derive(Clone, Debug, PartialEq)]
pub struct VciConfig {
    pub base_url: String,
    /// Whole-request timeout, body included.
    pub timeout: Duration,
}

impl Default for VciConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Headers the API expects from a browser client.
fn vci_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://trading.vietcap.com.vn/"),
    );
    headers.insert(
        ORIGIN,
        HeaderValue::from_static("https://trading.vietcap.com.vn/"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// Historical OHLC fetcher backed by the Vietcap chart API.
#[derive(Clone)]
pub struct VciFetcher {
    client: Client,
    config: VciConfig,
}

impl VciFetcher {
    pub fn new(config: VciConfig) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .default_headers(vci_headers())
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VciConfig {
        &self.config
    }

    fn history_url(&self) -> String {
        format!(
            "{}/chart/OHLCChart/gap-chart",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Scale a price from thousands of VND.
    fn to_vnd(value: f64) -> Option<Decimal> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value).map(|d| d * Decimal::ONE_THOUSAND)
    }

    fn bar_to_quote(query: &HistoryQuery, bar: &VciBar) -> Option<Quote> {
        let timestamp = DateTime::from_timestamp(bar.timestamp, 0)?;
        let date = timestamp.date_naive();
        if date < query.start() || date > query.end() {
            return None;
        }

        let quote = Quote::new(
            query.symbol(),
            timestamp,
            Self::to_vnd(bar.close?)?,
            CURRENCY,
            PROVIDER_ID,
        )
        .with_ohlcv(
            Self::to_vnd(bar.open?)?,
            Self::to_vnd(bar.high?)?,
            Self::to_vnd(bar.low?)?,
            Decimal::from(bar.volume?),
        );

        quote.is_consistent().then_some(quote)
    }
}

/// Map a transport failure onto the error taxonomy.
fn classify_transport(err: &reqwest::Error) -> MarketDataError {
    if err.is_timeout() {
        MarketDataError::Timeout {
            provider: PROVIDER_ID.to_string(),
        }
    } else if err.is_connect() {
        MarketDataError::Connection {
            provider: PROVIDER_ID.to_string(),
            message: err.to_string(),
        }
    } else {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("Request failed: {}", err),
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn classify_status(status: StatusCode, symbol: &str) -> MarketDataError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketDataError::Unauthorized {
            provider: PROVIDER_ID.to_string(),
        },
        StatusCode::NOT_FOUND => MarketDataError::SymbolNotFound(symbol.to_string()),
        other => MarketDataError::Upstream {
            provider: PROVIDER_ID.to_string(),
            status: other.as_u16(),
        },
    }
}

#[async_trait]
impl Fetcher for VciFetcher {
    type Query = HistoryQuery;
    type Request = VciHistoryRequest;
    type Record = VciBar;
    type Output = Quote;

    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn transform_query(&self, query: &HistoryQuery) -> Result<VciHistoryRequest, MarketDataError> {
        let symbol = models::map_index_symbol(query.symbol()).unwrap_or(query.symbol());

        let to = query
            .end()
            .and_hms_opt(23, 59, 59)
            .map(|end| end.and_utc().timestamp())
            .ok_or_else(|| {
                MarketDataError::validation(format!("invalid end date {}", query.end()))
            })?;

        Ok(VciHistoryRequest {
            time_frame: models::time_frame(query.interval()),
            symbols: vec![symbol.to_string()],
            to,
            count_back: models::count_back(query.interval(), query.span_days()),
        })
    }

    async fn extract_data(&self, request: VciHistoryRequest) -> Result<Vec<VciBar>, MarketDataError> {
        let symbol = request.symbols.first().cloned().unwrap_or_default();
        debug!(
            "VCI request: {} x{} up to {}",
            symbol, request.count_back, request.to
        );

        let response = self
            .client
            .post(self.history_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &symbol));
        }

        let data: Vec<VciOhlcResponse> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                classify_transport(&e)
            } else {
                MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Failed to parse response: {}", e),
                }
            }
        })?;

        Ok(data
            .into_iter()
            .next()
            .map(VciOhlcResponse::into_bars)
            .unwrap_or_default())
    }

    fn transform_data(&self, query: &HistoryQuery, records: Vec<VciBar>) -> Vec<Quote> {
        let total = records.len();
        let quotes: Vec<Quote> = records
            .iter()
            .filter_map(|bar| Self::bar_to_quote(query, bar))
            .collect();

        if quotes.len() < total {
            warn!(
                "VCI: skipped {} of {} bars for {} (malformed or out of range)",
                total - quotes.len(),
                total,
                query
            );
        }
        quotes
    }
}
