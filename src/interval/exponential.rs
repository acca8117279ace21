use std::time::Duration;

use super::{as_nanos, from_nanos, IntervalGenerator};
use crate::jitter::Jitter;

/// Multiplier used when the configured one would not grow the interval.
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Geometrically growing intervals, capped at a maximum.
///
/// The first call returns `min`. Each later call multiplies the previous
/// *baseline* by the multiplier and clamps it to `[min, max]`. Jitter is
/// applied to the returned value only, never to the stored baseline, so the
/// growth stays monotonic and deterministic even when the output is random.
/// A jittered value may therefore fall slightly outside `[min, max]`.
///
/// Construction normalises the parameters instead of failing:
/// - `min > max` clamps `min` down to `max`
/// - a multiplier `<= 1` (or not finite) is replaced with [`DEFAULT_MULTIPLIER`]
#[derive(Debug, Clone)]
pub struct ExponentialInterval {
    baseline: Option<f64>,
    min: f64,
    max: f64,
    multiplier: f64,
    jitter: Jitter,
}

impl ExponentialInterval {
    /// Create a generator growing from `min` to `max` by `multiplier`.
    pub fn new(min: Duration, max: Duration, multiplier: f64, jitter: Jitter) -> Self {
        let max = as_nanos(max);
        let min = as_nanos(min).min(max);
        let multiplier = if multiplier.is_finite() && multiplier > 1.0 {
            multiplier
        } else {
            DEFAULT_MULTIPLIER
        };

        Self {
            baseline: None,
            min,
            max,
            multiplier,
            jitter,
        }
    }

    /// The unjittered value behind the last returned interval, if any.
    pub fn baseline(&self) -> Option<Duration> {
        self.baseline.map(from_nanos)
    }

    /// The effective lower bound.
    pub fn min_interval(&self) -> Duration {
        from_nanos(self.min)
    }

    /// The effective upper bound.
    pub fn max_interval(&self) -> Duration {
        from_nanos(self.max)
    }

    /// The effective multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl IntervalGenerator for ExponentialInterval {
    fn next(&mut self) -> Duration {
        let candidate = match self.baseline {
            None => self.min,
            Some(prev) => (prev * self.multiplier).clamp(self.min, self.max),
        };
        self.baseline = Some(candidate);
        from_nanos(self.jitter.apply(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use std::sync::Arc;

    fn secs(v: f64) -> Duration {
        Duration::from_secs_f64(v)
    }

    #[test]
    fn test_default_multiplier_sequence() {
        let mut ig = ExponentialInterval::new(
            Duration::from_millis(500),
            Duration::from_secs(60),
            DEFAULT_MULTIPLIER,
            Jitter::None,
        );
        let expected = [0.5, 0.75, 1.125, 1.6875, 2.53125, 3.796875];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(ig.next(), secs(*want), "interval for iteration {}", i);
        }
    }

    #[test]
    fn test_doubling_matches_powers() {
        let mut ig = ExponentialInterval::new(
            Duration::from_secs(1),
            Duration::from_secs(3_600),
            2.0,
            Jitter::None,
        );
        for n in 0..10u32 {
            assert_eq!(ig.next(), Duration::from_secs(2u64.pow(n)));
        }
    }

    #[test]
    fn test_caps_at_max_and_stays() {
        let mut ig = ExponentialInterval::new(
            Duration::from_millis(500),
            Duration::from_secs(120),
            2.0,
            Jitter::None,
        );
        let delays: Vec<Duration> = (0..12).map(|_| ig.next()).collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[7], Duration::from_secs(64));
        assert_eq!(delays[8], Duration::from_secs(120));
        assert!(delays[8..].iter().all(|d| *d == Duration::from_secs(120)));
    }

    #[test]
    fn test_min_above_max_is_clamped() {
        let mut ig = ExponentialInterval::new(
            Duration::from_secs(10),
            Duration::from_secs(2),
            2.0,
            Jitter::None,
        );
        assert_eq!(ig.min_interval(), Duration::from_secs(2));
        assert_eq!(ig.next(), Duration::from_secs(2));
        assert_eq!(ig.next(), Duration::from_secs(2));
    }

    #[test]
    fn test_non_growing_multiplier_uses_default() {
        for m in [1.0, 0.5, -2.0, f64::NAN, f64::INFINITY] {
            let ig = ExponentialInterval::new(
                Duration::from_secs(1),
                Duration::from_secs(10),
                m,
                Jitter::None,
            );
            assert_eq!(ig.multiplier(), DEFAULT_MULTIPLIER, "multiplier {}", m);
        }
    }

    #[test]
    fn test_jitter_does_not_feed_back_into_baseline() {
        let jitter = Jitter::new(0.5, Arc::new(SeededRandom::new(11)));
        let mut ig = ExponentialInterval::new(
            Duration::from_secs(1),
            Duration::from_secs(1_000),
            2.0,
            jitter,
        );
        for n in 0..8u32 {
            let delay = ig.next();
            let base = Duration::from_secs(2u64.pow(n));
            assert_eq!(ig.baseline(), Some(base));
            assert!(delay >= base / 2, "{:?} below {:?}", delay, base / 2);
            assert!(delay <= base * 3 / 2 + Duration::from_nanos(1));
        }
    }

    #[test]
    fn test_baseline_starts_empty() {
        let ig = ExponentialInterval::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
            2.0,
            Jitter::None,
        );
        assert_eq!(ig.baseline(), None);
        assert_eq!(ig.max_interval(), Duration::from_secs(2));
    }
}
