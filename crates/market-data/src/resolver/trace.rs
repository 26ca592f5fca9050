//! Per-resolution record of which sources were consulted.

use std::fmt;

/// Outcome of consulting one source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttemptOutcome {
    /// The source produced records.
    Hit { records: usize },
    /// Cache tier had no usable entry.
    Miss,
    /// A live source returned nothing (failed or had no data).
    Empty,
    /// The cache store itself failed; treated as a miss.
    StoreError { message: String },
}

/// Record of a single source consulted during a resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceAttempt {
    pub source: String,
    pub outcome: AttemptOutcome,
    /// Cache tiers are recorded but are not reported as attempted sources.
    pub is_cache: bool,
}

/// Ordered trace of one resolution.
#[derive(Clone, Debug, Default)]
pub struct ResolutionTrace {
    attempts: Vec<SourceAttempt>,
}

impl ResolutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cache(&mut self, tier: &str, outcome: AttemptOutcome) {
        self.attempts.push(SourceAttempt {
            source: tier.to_string(),
            outcome,
            is_cache: true,
        });
    }

    pub(crate) fn record_source(&mut self, name: &str, records: usize) {
        let outcome = if records == 0 {
            AttemptOutcome::Empty
        } else {
            AttemptOutcome::Hit { records }
        };
        self.attempts.push(SourceAttempt {
            source: name.to_string(),
            outcome,
            is_cache: false,
        });
    }

    pub fn attempts(&self) -> &[SourceAttempt] {
        &self.attempts
    }

    /// Live sources consulted, in order.
    pub fn attempted_sources(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !a.is_cache)
            .map(|a| a.source.clone())
            .collect()
    }

    pub fn has_hit(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Hit { .. }))
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResolutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            match &attempt.outcome {
                AttemptOutcome::Hit { records } => {
                    write!(f, "{}: HIT ({})", attempt.source, records)?
                }
                AttemptOutcome::Miss => write!(f, "{}: MISS", attempt.source)?,
                AttemptOutcome::Empty => write!(f, "{}: EMPTY", attempt.source)?,
                AttemptOutcome::StoreError { message } => {
                    write!(f, "{}: ERROR ({})", attempt.source, message)?
                }
            }
        }
        Ok(())
    }
}
