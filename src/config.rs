//! Plain-data policy configuration.
//!
//! [`PolicyConfig`] mirrors every [`Policy`] option as a value that can be
//! stored, compared and (with the `serde` feature) deserialised from any
//! serde format. The random source is not part of the data; attach one with
//! [`Policy::with_random`] after conversion.
//!
//! ```rust
//! use pacer::{Policy, PolicyConfig, Strategy};
//! use std::time::Duration;
//!
//! let config = PolicyConfig {
//!     strategy: Strategy::Constant { interval: Duration::from_secs(2) },
//!     max_retries: 3,
//!     ..PolicyConfig::default()
//! };
//!
//! let policy = Policy::from_config(&config);
//! assert_eq!(policy.max_retries(), 3);
//! assert_eq!(policy.strategy(), &config.strategy);
//! ```

use std::time::Duration;

use crate::interval::DEFAULT_MULTIPLIER;
use crate::policy::{
    FirstAttempt, Policy, Strategy, DEFAULT_MAX_INTERVAL, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_INTERVAL,
};

/// Every option of a [`Policy`], as data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PolicyConfig {
    /// Interval strategy.
    pub strategy: Strategy,
    /// Jitter factor; outside `(0, 1)` disables jitter.
    pub jitter_factor: f64,
    /// Retries after the first attempt; `0` for unbounded.
    pub max_retries: u32,
    /// Session time budget; `None` for unbounded.
    pub max_elapsed_time: Option<Duration>,
    /// Whether the first attempt waits.
    pub first_attempt: FirstAttempt,
}

impl Default for PolicyConfig {
    /// Matches [`Policy::exponential`].
    fn default() -> Self {
        Self {
            strategy: Strategy::Exponential {
                min_interval: DEFAULT_MIN_INTERVAL,
                max_interval: DEFAULT_MAX_INTERVAL,
                multiplier: DEFAULT_MULTIPLIER,
            },
            jitter_factor: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
            max_elapsed_time: None,
            first_attempt: FirstAttempt::Immediate,
        }
    }
}

impl Policy {
    /// Build a policy from plain configuration.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let base = match config.strategy {
            Strategy::Null => Policy::null(),
            Strategy::Constant { interval } => Policy::constant(interval),
            Strategy::Exponential {
                min_interval,
                max_interval,
                multiplier,
            } => Policy::exponential()
                .with_min_interval(min_interval)
                .with_max_interval(max_interval)
                .with_multiplier(multiplier),
        };
        base.with_jitter(config.jitter_factor)
            .with_max_retries(config.max_retries)
            .with_max_elapsed_time(config.max_elapsed_time.unwrap_or_default())
            .with_first_attempt(config.first_attempt)
    }

    /// The configuration this policy was built with.
    pub fn config(&self) -> PolicyConfig {
        PolicyConfig {
            strategy: *self.strategy(),
            jitter_factor: self.jitter_factor(),
            max_retries: self.max_retries(),
            max_elapsed_time: self.max_elapsed_time(),
            first_attempt: self.first_attempt(),
        }
    }
}

impl From<PolicyConfig> for Policy {
    fn from(config: PolicyConfig) -> Self {
        Policy::from_config(&config)
    }
}

impl From<&Policy> for PolicyConfig {
    fn from(policy: &Policy) -> Self {
        policy.config()
    }
}
