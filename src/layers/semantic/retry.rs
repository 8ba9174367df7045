//! Retry/backoff policy for the Semantic Analysis Layer (§4.7).

use rand::Rng;
use std::time::Duration;

/// Whether a failure is worth retrying. HTTP 429 and 5xx, network errors,
/// and timeouts are transient; any other 4xx or a malformed response is
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

#[must_use]
pub fn classify_status(status: u16) -> FailureKind {
    if status == 429 || (500..600).contains(&status) {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Exponential backoff with uniform jitter: `base * 2^attempt + U(0, base)`.
#[must_use]
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(20));
    let jitter = rand::thread_rng().gen_range(0..=base_delay_ms.max(1));
    Duration::from_millis(exponential.saturating_add(jitter))
}
