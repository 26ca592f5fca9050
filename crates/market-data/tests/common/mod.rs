//! Shared fixtures for resolution tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use quotefeed_market_data::{
    CacheStore, CircuitBreaker, CircuitBreakerConfig, DataSource, Fetcher, FetcherExt,
    HistoryQuery, MarketDataError, Quote, RetryConfig, RetryPolicy,
};
use rust_decimal::Decimal;

/// What a [`SpyFetcher`] does on its next call.
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Return this many daily bars starting at the query's start date.
    Succeed(usize),
    /// Like `Succeed`, with prices built from binary floats.
    InexactPrices(usize),
    /// Fail with a 503.
    Unavailable,
    /// Fail with a 404-style error.
    NotFound,
}

/// Scriptable fetcher that counts I/O calls.
pub struct SpyFetcher {
    name: &'static str,
    behavior: Mutex<Behavior>,
    calls: AtomicU32,
}

impl SpyFetcher {
    pub fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior: Mutex::new(behavior),
            calls: AtomicU32::new(0),
        })
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for SpyFetcher {
    type Query = HistoryQuery;
    type Request = HistoryQuery;
    type Record = Quote;
    type Output = Quote;

    fn id(&self) -> &str {
        self.name
    }

    fn transform_query(&self, query: &HistoryQuery) -> Result<HistoryQuery, MarketDataError> {
        Ok(query.clone())
    }

    async fn extract_data(&self, request: HistoryQuery) -> Result<Vec<Quote>, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            Behavior::Succeed(count) => Ok(bars(&request, count, self.name)),
            Behavior::InexactPrices(count) => Ok(float_bars(&request, count, self.name)),
            Behavior::Unavailable => Err(MarketDataError::Upstream {
                provider: self.name.to_string(),
                status: 503,
            }),
            Behavior::NotFound => Err(MarketDataError::SymbolNotFound(
                request.symbol().to_string(),
            )),
        }
    }

    fn transform_data(&self, _query: &HistoryQuery, records: Vec<Quote>) -> Vec<Quote> {
        records
    }
}

/// `count` consecutive daily bars for the query's symbol.
pub fn bars(query: &HistoryQuery, count: usize, source: &str) -> Vec<Quote> {
    (0..count)
        .map(|i| {
            let date = query.start() + chrono::Duration::days(i as i64);
            let timestamp = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
            let close = Decimal::from(67_000 + i as i64 * 100);
            Quote::new(query.symbol(), timestamp, close, "VND", source)
        })
        .collect()
}

/// Bars whose prices keep every digit of an `f64`, e.g. 187.43999999999999772626324551.
pub fn float_bars(query: &HistoryQuery, count: usize, source: &str) -> Vec<Quote> {
    bars(query, count, source)
        .into_iter()
        .enumerate()
        .map(|(i, quote)| {
            let price = |base: f64| Decimal::from_f64_retain(base + i as f64 * 0.1).unwrap();
            let mut quote =
                quote.with_ohlcv(price(186.1), price(188.3), price(185.9), Decimal::from(1_000));
            quote.close = price(187.44);
            quote
        })
        .collect()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn vnm_january() -> HistoryQuery {
    HistoryQuery::daily("vnm", date(2024, 1, 1), date(2024, 1, 31)).unwrap()
}

pub fn breaker(name: &'static str, threshold: u32, reset_timeout: Duration) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::with_config(
        name,
        CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout,
        },
    ))
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        max_attempts: 3,
        base_wait: Duration::from_millis(100),
        multiplier: 2.0,
        max_wait: Duration::from_secs(1),
        deadline: None,
    })
}

/// Wrap a spy the way production fetchers are wrapped.
pub fn source(
    spy: &Arc<SpyFetcher>,
    breaker: &Arc<CircuitBreaker>,
) -> Arc<dyn DataSource<HistoryQuery, Quote>> {
    Arc::new(
        spy.clone()
            .with_retry(quick_retry())
            .with_breaker(breaker.clone())
            .graceful(),
    )
}

/// A cache store that is down.
pub struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, MarketDataError> {
        Err(MarketDataError::Cache {
            message: "connection refused".to_string(),
        })
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), MarketDataError> {
        Err(MarketDataError::Cache {
            message: "connection refused".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> Result<bool, MarketDataError> {
        Err(MarketDataError::Cache {
            message: "connection refused".to_string(),
        })
    }
}
