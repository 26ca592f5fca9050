//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The closed error enum for every resolution step
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during market data resolution.
///
/// The provider family (`ProviderError`, `Timeout`, `RateLimited`,
/// `Unauthorized`, `Connection`, `Upstream`) is produced by fetchers when
/// the upstream call fails. The remaining variants come from the
/// resilience layer itself.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Generic upstream failure (malformed payload, unexpected response).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    /// Never retried here, the breaker and callers handle throttling.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider rejected our credentials (HTTP 401/403).
    #[error("Unauthorized: {provider}")]
    Unauthorized {
        /// The provider that rejected the request
        provider: String,
    },

    /// The connection to the provider could not be established or was reset.
    #[error("Connection failed: {provider} - {message}")]
    Connection {
        /// The provider we failed to reach
        provider: String,
        /// Transport error description
        message: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("Upstream error: {provider} returned HTTP {status}")]
    Upstream {
        /// The provider that answered
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Query or data validation failed.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The circuit breaker rejected the call without attempting I/O.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// Every source in the fallback chain was exhausted.
    #[error("No data found for {query} (attempted: {})", .attempted_sources.join(", "))]
    DataNotFound {
        /// Human readable description of the query
        query: String,
        /// Sources consulted, in order
        attempted_sources: Vec<String>,
    },

    /// Only stale cached data was available and the caller refused it.
    #[error("Only stale data available for {query} (cached at {cached_at})")]
    StaleData {
        /// Human readable description of the query
        query: String,
        /// When the stale entry was written
        cached_at: DateTime<Utc>,
    },

    /// The cache store failed. Never surfaced by the resolver.
    #[error("Cache error: {message}")]
    Cache {
        /// Backend error description
        message: String,
    },

    /// A cache payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotefeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout { provider: "VCI".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::RateLimited { provider: "VCI".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient transport failures
            Self::Timeout { .. } | Self::Connection { .. } => RetryClass::WithBackoff,

            Self::Upstream { status, .. } if matches!(status, 500 | 502 | 503 | 504) => {
                RetryClass::WithBackoff
            }

            Self::ProviderError { .. }
            | Self::Upstream { .. }
            | Self::RateLimited { .. }
            | Self::Unauthorized { .. }
            | Self::SymbolNotFound(_)
            | Self::ValidationFailed { .. }
            | Self::CircuitOpen { .. }
            | Self::DataNotFound { .. }
            | Self::StaleData { .. }
            | Self::Cache { .. }
            | Self::Serialization(_) => RetryClass::Never,
        }
    }

    /// Whether this error describes a failed upstream provider call.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderError { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Unauthorized { .. }
                | Self::Connection { .. }
                | Self::Upstream { .. }
        )
    }

    /// Whether this error says something about the health of the upstream.
    ///
    /// Unknown symbols and invalid queries are the caller's problem and must
    /// not trip a circuit breaker.
    pub fn indicates_outage(&self) -> bool {
        self.is_provider_error()
    }

    /// Stable machine-readable code, also used as the log throttling class.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ProviderError { .. } => "provider.error",
            Self::Timeout { .. } => "provider.timeout",
            Self::RateLimited { .. } => "provider.rate_limited",
            Self::Unauthorized { .. } => "provider.unauthorized",
            Self::Connection { .. } => "provider.connection",
            Self::Upstream { .. } => "provider.upstream",
            Self::SymbolNotFound(_) => "symbol_not_found",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::DataNotFound { .. } => "data_not_found",
            Self::StaleData { .. } => "stale_data",
            Self::Cache { .. } => "cache",
            Self::Serialization(_) => "serialization",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub(crate) fn cache(err: impl std::fmt::Display) -> Self {
        Self::Cache {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> String {
        "VCI".to_string()
    }

    #[test]
    fn test_transport_failures_retry_with_backoff() {
        let timeout = MarketDataError::Timeout {
            provider: provider(),
        };
        let connection = MarketDataError::Connection {
            provider: provider(),
            message: "connection reset".to_string(),
        };
        assert_eq!(timeout.retry_class(), RetryClass::WithBackoff);
        assert_eq!(connection.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_server_errors_retry_with_backoff() {
        for status in [500, 502, 503, 504] {
            let error = MarketDataError::Upstream {
                provider: provider(),
                status,
            };
            assert_eq!(error.retry_class(), RetryClass::WithBackoff, "status {status}");
        }
    }

    #[test]
    fn test_other_statuses_never_retry() {
        for status in [400, 404, 418, 501] {
            let error = MarketDataError::Upstream {
                provider: provider(),
                status,
            };
            assert_eq!(error.retry_class(), RetryClass::Never, "status {status}");
        }
    }

    #[test]
    fn test_rate_limited_is_not_retried() {
        let error = MarketDataError::RateLimited {
            provider: provider(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert!(error.is_provider_error());
    }

    #[test]
    fn test_auth_not_found_and_validation_never_retry() {
        let unauthorized = MarketDataError::Unauthorized {
            provider: provider(),
        };
        let not_found = MarketDataError::SymbolNotFound("XXX".to_string());
        let invalid = MarketDataError::validation("empty symbol");

        assert_eq!(unauthorized.retry_class(), RetryClass::Never);
        assert_eq!(not_found.retry_class(), RetryClass::Never);
        assert_eq!(invalid.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_outage_classification() {
        assert!(MarketDataError::Timeout {
            provider: provider()
        }
        .indicates_outage());
        assert!(!MarketDataError::SymbolNotFound("XXX".to_string()).indicates_outage());
        assert!(!MarketDataError::CircuitOpen {
            provider: provider()
        }
        .indicates_outage());
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::DataNotFound {
            query: "VNM 2024-01-01..2024-01-31 (1d)".to_string(),
            attempted_sources: vec!["VCI".to_string(), "YAHOO".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "No data found for VNM 2024-01-01..2024-01-31 (1d) (attempted: VCI, YAHOO)"
        );

        let error = MarketDataError::Upstream {
            provider: provider(),
            status: 503,
        };
        assert_eq!(error.to_string(), "Upstream error: VCI returned HTTP 503");
    }

    #[test]
    fn test_codes_are_distinct_per_class() {
        let a = MarketDataError::Timeout {
            provider: "A".to_string(),
        };
        let b = MarketDataError::Timeout {
            provider: "B".to_string(),
        };
        let c = MarketDataError::RateLimited {
            provider: "A".to_string(),
        };
        assert_eq!(a.code(), b.code());
        assert_ne!(a.code(), c.code());
    }
}
