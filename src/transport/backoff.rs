//! Reconnect backoff
//!
//! Exponential delay growth between reconnect attempts, capped at a
//! ceiling, with a bounded random addend so a fleet of clients does not
//! reconnect in lockstep after a server restart.

use std::time::Duration;

use rand::Rng;

/// Deterministic part of the reconnect delay: `min(base * 2^retry, max)`.
///
/// Kept separate from the jitter so the monotonicity and ceiling behavior
/// are directly testable.
pub fn base_backoff(retry_count: u32, base: Duration, max: Duration) -> Duration {
    // 2^retry saturates well before the ceiling matters
    let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Full reconnect delay: deterministic backoff plus bounded jitter.
pub fn next_delay(retry_count: u32, base: Duration, max: Duration, jitter_max: Duration) -> Duration {
    let jitter = if jitter_max.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_max.as_millis() as u64))
    };

    base_backoff(retry_count, base, max) + jitter
}
