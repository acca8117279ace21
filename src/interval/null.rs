use std::time::Duration;

use super::IntervalGenerator;

/// Always returns a zero delay.
///
/// Paired with a single grant, it models "one immediate attempt, no retries".
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInterval;

impl IntervalGenerator for NullInterval {
    fn next(&mut self) -> Duration {
        Duration::ZERO
    }
}
