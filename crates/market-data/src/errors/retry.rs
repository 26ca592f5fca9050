/// Classification for retry policy.
///
/// Used by [`RetryPolicy`](crate::resilience::RetryPolicy) to decide whether a
/// failed attempt is worth repeating.
///
/// # Behavior Summary
///
/// | Class | Retried? | Examples |
/// |-------|----------|----------|
/// | `WithBackoff` | Yes, until attempts run out | timeout, connection reset, HTTP 500/502/503/504 |
/// | `Never` | No | rate limit, auth, not found, validation, open circuit |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure, retry after an exponential backoff wait.
    WithBackoff,

    /// Never retry.
    ///
    /// Either the request is fundamentally invalid, or retrying would
    /// compound a provider-side throttle (HTTP 429).
    Never,
}
