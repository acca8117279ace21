//! Random sources used for jittering intervals.
//!
//! Jitter draws happen on the background task of every running
//! [`Controller`](crate::Controller), so a source attached to a
//! [`Policy`](crate::Policy) is shared between sessions and must be safe for
//! concurrent use.
//!
//! - [`ThreadRandom`] draws from the calling thread's generator (default)
//! - [`SeededRandom`] wraps a seeded [`StdRng`] behind a mutex, for reproducible runs

use std::fmt;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed floats in `[0, 1)`.
///
/// # Examples
///
/// ```rust
/// use pacer::random::{Random, SeededRandom};
///
/// let rng = SeededRandom::new(7);
/// let x = rng.float64();
/// assert!((0.0..1.0).contains(&x));
/// ```
pub trait Random: Send + Sync + fmt::Debug {
    /// Draw the next float in `[0, 1)`.
    fn float64(&self) -> f64;
}

/// Draws from [`rand::rng`], the lazily seeded thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl Random for ThreadRandom {
    fn float64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// A seeded generator that can be shared between threads.
///
/// Two instances built from the same seed produce the same sequence, as long
/// as the draws are not interleaved between concurrent sessions.
pub struct SeededRandom {
    inner: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl Random for SeededRandom {
    fn float64(&self) -> f64 {
        // A panic while holding the lock cannot leave StdRng half-updated.
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random::<f64>()
    }
}
