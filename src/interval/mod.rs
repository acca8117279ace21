//! Interval generators.
//!
//! An interval generator produces the delay to wait before each retry. It is
//! a lazy, infinite and stateful sequence: every call to
//! [`IntervalGenerator::next`] advances it. Generators are not restartable, so
//! a fresh one is built for every session by [`Policy::start`](crate::Policy::start).
//!
//! - [`NullInterval`]: always zero
//! - [`ConstantInterval`]: the same (jittered) interval every time
//! - [`ExponentialInterval`]: geometric growth from a minimum up to a cap
//!
//! ```rust
//! use pacer::interval::{ExponentialInterval, IntervalGenerator};
//! use pacer::jitter::Jitter;
//! use std::time::Duration;
//!
//! let mut ig = ExponentialInterval::new(
//!     Duration::from_secs(1),
//!     Duration::from_secs(5),
//!     2.0,
//!     Jitter::None,
//! );
//!
//! let delays: Vec<_> = (0..5).map(|_| ig.next()).collect();
//! assert_eq!(
//!     delays,
//!     [1, 2, 4, 5, 5].map(Duration::from_secs),
//! );
//! ```

mod constant;
mod exponential;
mod null;

use std::time::Duration;

pub use constant::ConstantInterval;
pub use exponential::{ExponentialInterval, DEFAULT_MULTIPLIER};
pub use null::NullInterval;

/// A stateful source of retry delays.
///
/// A generator has a single owner; calling `next` concurrently is not
/// supported (and `&mut self` rules it out).
pub trait IntervalGenerator: Send {
    /// Advance the sequence and return the next delay.
    fn next(&mut self) -> Duration;
}

impl<G: IntervalGenerator + ?Sized> IntervalGenerator for Box<G> {
    fn next(&mut self) -> Duration {
        (**self).next()
    }
}

pub(crate) fn as_nanos(d: Duration) -> f64 {
    d.as_nanos() as f64
}

/// Float-to-int casts saturate: negative and NaN become zero, overflow
/// becomes the largest representable duration.
pub(crate) fn from_nanos(nanos: f64) -> Duration {
    Duration::from_nanos(nanos as u64)
}
