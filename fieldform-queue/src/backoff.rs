//! Retry backoff schedule.

use chrono::Duration;

/// First retry delay, in seconds.
pub const BASE_DELAY_SECS: i64 = 2;

/// Ceiling on the retry delay, in seconds (5 minutes).
pub const MAX_DELAY_SECS: i64 = 300;

/// Exponential backoff with a cap: `min(2^attempts * base, max)`.
///
/// `attempts` is the failure count so far, so the first retry after one
/// failure waits `2 * base`.
#[must_use]
pub fn backoff_delay(attempts: u32) -> Duration {
    // 2^32 seconds is already far past the cap; avoid shift overflow.
    if attempts >= 32 {
        return Duration::seconds(MAX_DELAY_SECS);
    }
    let secs = (1i64 << attempts)
        .saturating_mul(BASE_DELAY_SECS)
        .min(MAX_DELAY_SECS);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(backoff_delay(0), Duration::seconds(2));
        assert_eq!(backoff_delay(1), Duration::seconds(4));
        assert_eq!(backoff_delay(2), Duration::seconds(8));
        assert_eq!(backoff_delay(3), Duration::seconds(16));
    }

    #[test]
    fn caps_at_max_delay() {
        assert_eq!(backoff_delay(10), Duration::seconds(MAX_DELAY_SECS));
        assert_eq!(backoff_delay(63), Duration::seconds(MAX_DELAY_SECS));
        // Shift widths past the integer size must not wrap around.
        assert_eq!(backoff_delay(200), Duration::seconds(MAX_DELAY_SECS));
    }
}
