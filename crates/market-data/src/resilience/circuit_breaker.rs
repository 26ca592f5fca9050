//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to prevent cascading failures
//! when a provider is experiencing issues. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are rejected without I/O.
//! - **HalfOpen**: Cooldown elapsed, probe requests are let through.
//!
//! One breaker is built per provider at startup and shared by `Arc` with
//! every fetcher that talks to that provider. State lives in atomics and is
//! updated without a lock. `is_available` followed by the call is not
//! atomic, so several concurrent callers may probe while HalfOpen; a missed
//! transition costs a few extra upstream calls, never corrupt state.
//!
//! The circuit breaker is in-memory and resets on application restart.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use log::{debug, info};
use tokio::time::Instant;

use crate::models::ProviderId;

/// Default number of failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time since the last failure before a probe is allowed.
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Sentinel for "no failure recorded yet".
const NO_FAILURE: u64 = u64::MAX;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - probe requests allowed.
    HalfOpen,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            OPEN => Self::Open,
            HALF_OPEN => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time since the last failure before a probe is allowed.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

/// Circuit breaker guarding a single provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    /// Microseconds since `epoch` of the last failure, or `NO_FAILURE`.
    last_failure: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new(provider: impl Into<ProviderId>) -> Self {
        Self::with_config(provider, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom configuration.
    pub fn with_config(provider: impl Into<ProviderId>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            state: AtomicU8::new(CLOSED),
            failure_count: AtomicU32::new(0),
            last_failure: AtomicU64::new(NO_FAILURE),
            epoch: Instant::now(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check whether a call may proceed.
    ///
    /// Closed and HalfOpen allow the call. Open allows it only once
    /// `reset_timeout` has passed since the last failure, in which case the
    /// circuit moves to HalfOpen and the caller becomes the probe.
    pub fn is_available(&self) -> bool {
        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = self
                    .since_last_failure()
                    .map(|elapsed| elapsed > self.config.reset_timeout)
                    .unwrap_or(true);

                if !cooled_down {
                    return false;
                }

                if self
                    .state
                    .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        self.provider
                    );
                }
                true
            }
        }
    }

    /// Record a successful call: clears the failure count and closes.
    pub fn record_success(&self) {
        let previous = self.state.swap(CLOSED, Ordering::AcqRel);
        self.failure_count.store(0, Ordering::Release);

        if previous != CLOSED {
            info!(
                "Circuit breaker: closing circuit for '{}' after successful probe",
                self.provider
            );
        }
    }

    /// Record a failed call.
    ///
    /// Increments the failure count, stamps the failure time and opens the
    /// circuit once the threshold is reached. A failure while HalfOpen
    /// reopens immediately.
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        self.last_failure
            .store(self.micros_since_epoch(), Ordering::Release);

        let state = CircuitState::from_u8(self.state.load(Ordering::Acquire));
        match state {
            CircuitState::HalfOpen => {
                self.state.store(OPEN, Ordering::Release);
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    self.provider
                );
            }
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                self.state.store(OPEN, Ordering::Release);
                info!(
                    "Circuit breaker: opening circuit for '{}' after {} failures",
                    self.provider, failures
                );
            }
            CircuitState::Closed => {
                debug!(
                    "Circuit breaker: failure for '{}' ({}/{})",
                    self.provider, failures, self.config.failure_threshold
                );
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    self.provider
                );
            }
        }
    }

    /// Current state, without triggering the Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    /// Force the circuit back to Closed.
    pub fn reset(&self) {
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            self.provider
        );
        self.state.store(CLOSED, Ordering::Release);
        self.failure_count.store(0, Ordering::Release);
        self.last_failure.store(NO_FAILURE, Ordering::Release);
    }

    /// Point-in-time metrics.
    pub fn snapshot(&self) -> CircuitMetrics {
        CircuitMetrics {
            provider: self.provider.to_string(),
            state: self.state(),
            failure_count: self.failure_count(),
            since_last_failure: self.since_last_failure(),
        }
    }

    fn micros_since_epoch(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(NO_FAILURE - 1)
    }

    fn since_last_failure(&self) -> Option<Duration> {
        match self.last_failure.load(Ordering::Acquire) {
            NO_FAILURE => None,
            stamp => {
                let now = self.micros_since_epoch();
                Some(Duration::from_micros(now.saturating_sub(stamp)))
            }
        }
    }
}

/// Metrics for a single circuit.
#[derive(Clone, Debug)]
pub struct CircuitMetrics {
    /// Provider identifier.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Number of recorded failures.
    pub failure_count: u32,
    /// Time elapsed since the last failure.
    pub since_last_failure: Option<Duration>,
}
