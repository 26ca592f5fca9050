//! Market data models
//!
//! This module contains the core data types for resolution:
//! - `types` - Type alias for provider identifiers (ProviderId)
//! - `query` - Normalized history query (HistoryQuery, Interval)
//! - `quote` - Quote data structure produced by fetchers
//! - `resolved` - Resolution outcome with freshness flag (Resolved, Freshness)

mod query;
mod quote;
mod resolved;
mod types;

pub use query::{HistoryQuery, Interval};
pub use quote::Quote;
pub use resolved::{Freshness, Resolved, ResolutionSource};
pub use types::ProviderId;
