use std::time::Duration;

use super::{as_nanos, from_nanos, IntervalGenerator};
use crate::jitter::Jitter;

/// Returns the same base interval on every call, jittered independently.
#[derive(Debug, Clone)]
pub struct ConstantInterval {
    interval: Duration,
    jitter: Jitter,
}

impl ConstantInterval {
    /// Create a generator around `interval`.
    pub fn new(interval: Duration, jitter: Jitter) -> Self {
        Self { interval, jitter }
    }

    /// The unjittered interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl IntervalGenerator for ConstantInterval {
    fn next(&mut self) -> Duration {
        match self.jitter {
            Jitter::None => self.interval,
            ref jitter => from_nanos(jitter.apply(as_nanos(self.interval))),
        }
    }
}
