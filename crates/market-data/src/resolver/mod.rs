//! Fallback resolution over cache tiers and live sources.

mod fallback;
mod trace;

pub use fallback::{FallbackResolver, FallbackResolverBuilder, ResolveOptions};
pub use trace::{AttemptOutcome, ResolutionTrace, SourceAttempt};
