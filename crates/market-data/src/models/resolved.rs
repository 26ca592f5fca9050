use std::fmt;

use chrono::{DateTime, Utc};

/// Whether resolved data is current or a last-resort fallback.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Freshness {
    /// Served from a live provider or the fresh cache tier.
    Fresh,
    /// Served from the stale cache tier after every live source failed.
    Stale {
        /// When the stale entry was written
        cached_at: DateTime<Utc>,
    },
}

/// Where resolved data came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolutionSource {
    /// Fresh cache tier.
    Cache,
    /// A live provider, by id.
    Provider(String),
    /// Stale cache tier.
    StaleCache,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => f.write_str("cache"),
            Self::Provider(id) => f.write_str(id),
            Self::StaleCache => f.write_str("stale_cache"),
        }
    }
}

/// Successful resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved<R> {
    pub results: Vec<R>,
    pub freshness: Freshness,
    pub source: ResolutionSource,
}

impl<R> Resolved<R> {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<R> {
        self.results
    }
}
