// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect backoff math.
//!
//! The base curve is pure and monotone so it can be asserted directly;
//! jitter is applied on top from the supervisor's seedable RNG.

use std::time::Duration;

use rand::Rng;

/// Fraction of the delay used as the jitter band (plus or minus).
const JITTER_FRACTION: f64 = 0.2;

/// Exponential backoff delay for the given retry count, capped at `max`.
///
/// `min(base * 2^retry, max)` -- monotonically non-decreasing in `retry`.
pub fn backoff_delay(retry_count: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(retry_count.min(16));
    base.checked_mul(factor).map_or(max, |d| d.min(max))
}

/// Applies ±20% jitter to a delay so reconnecting bridges do not stampede.
pub fn with_jitter(delay: Duration, rng: &mut impl Rng) -> Duration {
    let band = delay.as_secs_f64() * JITTER_FRACTION;
    let offset = rng.gen_range(-1.0..=1.0) * band;
    Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BASE: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);

    #[test]
    fn delay_is_monotonically_non_decreasing_up_to_cap() {
        let mut prev = Duration::ZERO;
        for retry in 0..20 {
            let delay = backoff_delay(retry, BASE, MAX);
            assert!(delay >= prev, "delay decreased at retry {retry}");
            assert!(delay <= MAX);
            prev = delay;
        }
    }

    #[test]
    fn delay_doubles_until_capped() {
        assert_eq!(backoff_delay(0, BASE, MAX), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, BASE, MAX), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, BASE, MAX), Duration::from_secs(8));
        assert_eq!(backoff_delay(5, BASE, MAX), Duration::from_secs(30));
        assert_eq!(backoff_delay(30, BASE, MAX), Duration::from_secs(30));
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        assert_eq!(backoff_delay(u32::MAX, BASE, MAX), MAX);
    }

    #[test]
    fn jitter_stays_within_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = Duration::from_secs(10);
        for _ in 0..100 {
            let jittered = with_jitter(delay, &mut rng);
            assert!(jittered >= Duration::from_secs(8));
            assert!(jittered <= Duration::from_secs(12));
        }
    }

    #[test]
    fn jitter_is_deterministic_for_a_seed() {
        let a = with_jitter(Duration::from_secs(4), &mut StdRng::seed_from_u64(42));
        let b = with_jitter(Duration::from_secs(4), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
