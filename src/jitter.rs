//! Proportional jitter for retry intervals.
//!
//! Jitter spreads retries of many clients that failed at the same moment.
//! With a factor `f`, a magnitude `m` becomes a value drawn uniformly from
//! `[m·(1-f), m·(1+f)]`. One extra unit is added to the upper end of the
//! range so that truncating the result to whole nanoseconds does not bias
//! the draw downwards.
//!
//! A factor outside the open interval `(0, 1)` disables jitter. That is not
//! an error: the magnitude is returned unchanged and no random draw is made.

use std::sync::Arc;

use crate::random::Random;

/// Apply jitter to `magnitude` (nanoseconds).
///
/// # Examples
///
/// ```rust
/// use pacer::jitter;
/// use pacer::random::SeededRandom;
///
/// let rng = SeededRandom::new(1);
///
/// // Disabled: identity
/// assert_eq!(jitter::apply(1_000.0, 0.0, &rng), 1_000.0);
/// assert_eq!(jitter::apply(1_000.0, 1.0, &rng), 1_000.0);
///
/// // Enabled: within ±10% (+1ns)
/// let v = jitter::apply(1_000.0, 0.1, &rng);
/// assert!((900.0..=1_101.0).contains(&v));
/// ```
pub fn apply(magnitude: f64, factor: f64, rng: &dyn Random) -> f64 {
    if !is_enabled(factor) {
        return magnitude;
    }
    let delta = magnitude * factor;
    let min = magnitude - delta;
    let max = magnitude + delta;
    min + rng.float64() * (max - min + 1.0)
}

fn is_enabled(factor: f64) -> bool {
    factor > 0.0 && factor < 1.0
}

/// A jitter factor bound to the random source it draws from.
///
/// Built once per interval generator. An out-of-range factor is stored as
/// [`Jitter::None`].
#[derive(Debug, Clone, Default)]
pub enum Jitter {
    /// No randomisation.
    #[default]
    None,
    /// Proportional randomisation by `factor`, drawing from `rng`.
    Proportional {
        /// Factor in `(0, 1)`.
        factor: f64,
        /// Shared random source.
        rng: Arc<dyn Random>,
    },
}

impl Jitter {
    /// Build a jitter, disabling it when `factor` is not in `(0, 1)`.
    pub fn new(factor: f64, rng: Arc<dyn Random>) -> Self {
        if is_enabled(factor) {
            Jitter::Proportional { factor, rng }
        } else {
            Jitter::None
        }
    }

    /// The effective factor, `0.0` when disabled.
    pub fn factor(&self) -> f64 {
        match self {
            Jitter::None => 0.0,
            Jitter::Proportional { factor, .. } => *factor,
        }
    }

    /// Apply to `magnitude` (nanoseconds).
    pub fn apply(&self, magnitude: f64) -> f64 {
        match self {
            Jitter::None => magnitude,
            Jitter::Proportional { factor, rng } => apply(magnitude, *factor, rng.as_ref()),
        }
    }
}
