use std::path::PathBuf;
use std::time::Duration;

use quotefeed_market_data::{CsvConfig, ResilienceConfig, YahooConfig};

/// Which provider answers when VCI comes back empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Secondary {
    Yahoo,
    Csv,
    None,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub redis_url: Option<String>,
    pub resilience: ResilienceConfig,
    pub secondary: Secondary,
    pub yahoo: YahooConfig,
    pub csv: CsvConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let num = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let small = |key: &str, default: u32| -> u32 {
            u32::try_from(num(key, u64::from(default))).unwrap_or(default)
        };

        let mut resilience = ResilienceConfig::default();

        resilience.cache.prefix = var("QF_CACHE_PREFIX", "quotefeed");
        resilience.cache.fresh_ttl = Duration::from_secs(num("QF_CACHE_FRESH_TTL_SECS", 300));
        resilience.cache.stale_ttl = Duration::from_secs(num("QF_CACHE_STALE_TTL_SECS", 86_400));

        resilience.retry.max_attempts = small("QF_RETRY_MAX_ATTEMPTS", 3);
        resilience.retry.base_wait = Duration::from_millis(num("QF_RETRY_MIN_WAIT_MS", 1_000));
        resilience.retry.max_wait = Duration::from_millis(num("QF_RETRY_MAX_WAIT_MS", 10_000));

        resilience.breaker.failure_threshold = small("QF_BREAKER_FAILURE_THRESHOLD", 5);
        resilience.breaker.reset_timeout =
            Duration::from_secs(num("QF_BREAKER_RESET_TIMEOUT_SECS", 60));

        let fetch_timeout = Duration::from_secs(num("QF_FETCH_TIMEOUT_SECS", 30));
        resilience.vci.timeout = fetch_timeout;

        let yahoo = YahooConfig {
            suffix: var("QF_YAHOO_SUFFIX", ".VN"),
            timeout: fetch_timeout,
            ..YahooConfig::default()
        };

        let mut csv = CsvConfig::new(var("QF_CSV_DIR", "./data"));
        csv.timeout = fetch_timeout;

        let secondary = match var("QF_SECONDARY", "yahoo").trim().to_lowercase().as_str() {
            "csv" => Secondary::Csv,
            "none" | "" => Secondary::None,
            _ => Secondary::Yahoo,
        };

        let log_format = match var("QF_LOG_FORMAT", "text").trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let redis_url = lookup("QF_REDIS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Self {
            redis_url,
            resilience,
            secondary,
            yahoo,
            csv,
            log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert!(config.redis_url.is_none());
        assert_eq!(config.secondary, Secondary::Yahoo);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.resilience.cache.prefix, "quotefeed");
        assert_eq!(config.resilience.cache.fresh_ttl, Duration::from_secs(300));
        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert_eq!(config.yahoo.suffix, ".VN");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("QF_REDIS_URL", "redis://127.0.0.1:6379"),
            ("QF_CACHE_FRESH_TTL_SECS", "60"),
            ("QF_BREAKER_FAILURE_THRESHOLD", "2"),
            ("QF_FETCH_TIMEOUT_SECS", "5"),
            ("QF_SECONDARY", "CSV"),
            ("QF_CSV_DIR", "/tmp/exports"),
            ("QF_LOG_FORMAT", "json"),
        ]);

        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.resilience.cache.fresh_ttl, Duration::from_secs(60));
        assert_eq!(config.resilience.breaker.failure_threshold, 2);
        assert_eq!(config.resilience.vci.timeout, Duration::from_secs(5));
        assert_eq!(config.csv.timeout, Duration::from_secs(5));
        assert_eq!(config.secondary, Secondary::Csv);
        assert_eq!(config.csv.dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = config_from(&[
            ("QF_RETRY_MAX_ATTEMPTS", "many"),
            ("QF_CACHE_STALE_TTL_SECS", "-1"),
            ("QF_REDIS_URL", "  "),
            ("QF_BREAKER_FAILURE_THRESHOLD", "4294967296"),
        ]);

        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert_eq!(config.resilience.cache.stale_ttl, Duration::from_secs(86_400));
        assert!(config.redis_url.is_none());
        assert_eq!(config.resilience.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_out_of_range_counts_fall_back() {
        let config = config_from(&[("QF_RETRY_MAX_ATTEMPTS", "4294967296")]);
        assert_eq!(config.resilience.retry.max_attempts, 3);

        let config = config_from(&[("QF_RETRY_MAX_ATTEMPTS", "4294967295")]);
        assert_eq!(config.resilience.retry.max_attempts, u32::MAX);
    }
}
