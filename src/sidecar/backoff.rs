//! Exponential restart backoff.

use std::time::Duration;

/// Calculate the restart delay for the given failure count.
///
/// Doubles from `base` starting at the first failure and is hard-capped at
/// `max`. A count of zero yields `base`. No jitter is applied.
pub fn calculate_backoff(failure_count: u32, base: Duration, max: Duration) -> Duration {
    let exponent = failure_count.saturating_sub(1);

    match 2u32
        .checked_pow(exponent)
        .and_then(|factor| base.checked_mul(factor))
    {
        Some(delay) => delay.min(max),
        None => max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);

    #[test]
    fn test_backoff_doubles_per_failure() {
        let expected = [(1, 1), (2, 2), (3, 4), (4, 8), (5, 16), (6, 30), (7, 30)];
        for (count, secs) in expected {
            assert_eq!(
                calculate_backoff(count, BASE, MAX),
                Duration::from_secs(secs),
                "failure_count = {count}"
            );
        }
    }

    #[test]
    fn test_zero_failures_yields_base() {
        assert_eq!(calculate_backoff(0, BASE, MAX), BASE);
    }

    #[test]
    fn test_huge_counts_saturate_to_max() {
        assert_eq!(calculate_backoff(33, BASE, MAX), MAX);
        assert_eq!(calculate_backoff(u32::MAX, BASE, MAX), MAX);
        assert_eq!(
            calculate_backoff(31, Duration::from_secs(u64::MAX / 2), Duration::MAX),
            Duration::MAX
        );
    }

    #[test]
    fn test_monotonic_in_failure_count() {
        let mut previous = Duration::ZERO;
        for count in 0..64 {
            let current = calculate_backoff(count, Duration::from_millis(250), MAX);
            assert!(current >= previous);
            assert!(current <= MAX);
            previous = current;
        }
    }
}
