//! Backoff policy types and configuration.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::controller::{Controller, RetryLimit, Settings};
use crate::interval::{
    ConstantInterval, ExponentialInterval, IntervalGenerator, NullInterval, DEFAULT_MULTIPLIER,
};
use crate::jitter::Jitter;
use crate::random::{Random, ThreadRandom};

/// Default interval of a constant policy.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Default lower bound of an exponential policy.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
/// Default upper bound of an exponential policy.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Default retry budget of constant and exponential policies.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// A backoff policy: how long to wait between attempts, and when to stop.
///
/// Policies are immutable data plus a shared random source. They describe
/// behavior; [`Policy::start`] turns them into a running [`Controller`] for
/// one retry session. A policy can be reused for any number of sessions,
/// including concurrent ones.
///
/// # Bounds
///
/// - `max_retries`: retries after the first attempt; `0` means unbounded.
///   Constant and exponential policies default to [`DEFAULT_MAX_RETRIES`].
/// - `max_elapsed_time`: wall-clock budget for the whole session; zero means
///   unbounded (the default).
///
/// Builder methods never fail. Values that make no sense are clamped or
/// replaced with defaults when the session starts, and options that do not
/// apply to the policy's strategy are ignored.
///
/// # Examples
///
/// ```rust
/// use pacer::Policy;
/// use std::time::Duration;
///
/// let policy = Policy::exponential()
///     .with_min_interval(Duration::from_millis(100))
///     .with_max_interval(Duration::from_secs(5))
///     .with_multiplier(2.0)
///     .with_jitter(0.1)
///     .with_max_retries(5);
///
/// assert_eq!(policy.max_retries(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct Policy {
    strategy: Strategy,
    jitter_factor: f64,
    max_retries: u32,
    max_elapsed_time: Option<Duration>,
    first_attempt: FirstAttempt,
    random: Arc<dyn Random>,
}

/// How retry intervals evolve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "kind"))]
pub enum Strategy {
    /// One attempt, no retries.
    Null,
    /// The same interval before every retry.
    Constant {
        /// Base interval.
        #[cfg_attr(feature = "serde", serde(default = "defaults::interval"))]
        interval: Duration,
    },
    /// Geometric growth from `min_interval` up to `max_interval`.
    Exponential {
        /// First interval, and lower bound of every later one.
        #[cfg_attr(feature = "serde", serde(default = "defaults::min_interval"))]
        min_interval: Duration,
        /// Cap on the unjittered interval.
        #[cfg_attr(feature = "serde", serde(default = "defaults::max_interval"))]
        max_interval: Duration,
        /// Growth factor, must be greater than 1.
        #[cfg_attr(feature = "serde", serde(default = "defaults::multiplier"))]
        multiplier: f64,
    },
}

#[cfg(feature = "serde")]
mod defaults {
    use std::time::Duration;

    pub(super) fn interval() -> Duration {
        super::DEFAULT_INTERVAL
    }

    pub(super) fn min_interval() -> Duration {
        super::DEFAULT_MIN_INTERVAL
    }

    pub(super) fn max_interval() -> Duration {
        super::DEFAULT_MAX_INTERVAL
    }

    pub(super) fn multiplier() -> f64 {
        super::DEFAULT_MULTIPLIER
    }
}

/// Whether the first attempt of a session waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FirstAttempt {
    /// The first grant is issued immediately.
    #[default]
    Immediate,
    /// The first grant waits one generated interval, like every retry.
    Delayed,
}

impl Policy {
    fn with_strategy(strategy: Strategy, max_retries: u32) -> Self {
        Self {
            strategy,
            jitter_factor: 0.0,
            max_retries,
            max_elapsed_time: None,
            first_attempt: FirstAttempt::Immediate,
            random: Arc::new(ThreadRandom),
        }
    }

    /// A policy that allows exactly one attempt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pacer::{proceed, Policy};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # tokio_test::block_on(async {
    /// let mut c = Policy::null().start(&CancellationToken::new());
    /// assert!(proceed(&mut c).await);
    /// assert!(!proceed(&mut c).await);
    /// # });
    /// ```
    pub fn null() -> Self {
        Self::with_strategy(Strategy::Null, 0)
    }

    /// A policy waiting `interval` between attempts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pacer::Policy;
    /// use std::time::Duration;
    ///
    /// let policy = Policy::constant(Duration::from_millis(300)).with_max_retries(4);
    /// let mut ig = policy.interval_generator();
    ///
    /// assert_eq!(ig.next(), Duration::from_millis(300));
    /// assert_eq!(ig.next(), Duration::from_millis(300));
    /// ```
    pub fn constant(interval: Duration) -> Self {
        Self::with_strategy(Strategy::Constant { interval }, DEFAULT_MAX_RETRIES)
    }

    /// An exponential policy with the default bounds.
    ///
    /// Starts at [`DEFAULT_MIN_INTERVAL`], grows by [`DEFAULT_MULTIPLIER`] and
    /// caps at [`DEFAULT_MAX_INTERVAL`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pacer::Policy;
    /// use std::time::Duration;
    ///
    /// let mut ig = Policy::exponential().interval_generator();
    ///
    /// assert_eq!(ig.next(), Duration::from_millis(500));
    /// assert_eq!(ig.next(), Duration::from_millis(750));
    /// assert_eq!(ig.next(), Duration::from_millis(1125));
    /// ```
    pub fn exponential() -> Self {
        Self::with_strategy(
            Strategy::Exponential {
                min_interval: DEFAULT_MIN_INTERVAL,
                max_interval: DEFAULT_MAX_INTERVAL,
                multiplier: DEFAULT_MULTIPLIER,
            },
            DEFAULT_MAX_RETRIES,
        )
    }

    /// Set the interval of a constant policy.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if let Strategy::Constant { interval: ref mut i } = self.strategy {
            *i = interval;
        }
        self
    }

    /// Set the first (and smallest) interval of an exponential policy.
    pub fn with_min_interval(mut self, d: Duration) -> Self {
        if let Strategy::Exponential {
            ref mut min_interval,
            ..
        } = self.strategy
        {
            *min_interval = d;
        }
        self
    }

    /// Set the cap of an exponential policy.
    ///
    /// If the minimum ends up above the cap, the minimum is lowered to the
    /// cap when a session starts.
    pub fn with_max_interval(mut self, d: Duration) -> Self {
        if let Strategy::Exponential {
            ref mut max_interval,
            ..
        } = self.strategy
        {
            *max_interval = d;
        }
        self
    }

    /// Set the growth factor of an exponential policy.
    ///
    /// Must be greater than `1.0`; anything else falls back to
    /// [`DEFAULT_MULTIPLIER`] when a session starts.
    pub fn with_multiplier(mut self, m: f64) -> Self {
        if let Strategy::Exponential {
            ref mut multiplier,
            ..
        } = self.strategy
        {
            *multiplier = m;
        }
        self
    }

    /// Randomise each interval by ±`factor`.
    ///
    /// A factor outside `(0, 1)` silently disables jitter.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Set the maximum number of retries, `0` for unbounded.
    ///
    /// This does not include the initial attempt: `with_max_retries(3)`
    /// allows up to 4 attempts. Ignored by [`Policy::null`].
    pub fn with_max_retries(mut self, n: u32) -> Self {
        if !matches!(self.strategy, Strategy::Null) {
            self.max_retries = n;
        }
        self
    }

    /// Stop granting attempts once `d` has elapsed since the session started.
    ///
    /// A zero duration removes the limit.
    pub fn with_max_elapsed_time(mut self, d: Duration) -> Self {
        self.max_elapsed_time = (!d.is_zero()).then_some(d);
        self
    }

    /// Use `random` for jitter draws.
    ///
    /// The source is shared by every session started from this policy.
    pub fn with_random(mut self, random: Arc<dyn Random>) -> Self {
        self.random = random;
        self
    }

    /// Choose whether the first attempt waits.
    pub fn with_first_attempt(mut self, first: FirstAttempt) -> Self {
        self.first_attempt = first;
        self
    }

    /// Get the interval strategy, as configured.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Get the configured jitter factor.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Get the retry budget, `0` for unbounded.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the session time budget.
    pub fn max_elapsed_time(&self) -> Option<Duration> {
        self.max_elapsed_time
    }

    /// Get the first attempt behavior.
    pub fn first_attempt(&self) -> FirstAttempt {
        self.first_attempt
    }

    /// Build a fresh interval generator for this policy.
    pub fn interval_generator(&self) -> Box<dyn IntervalGenerator> {
        let jitter = Jitter::new(self.jitter_factor, Arc::clone(&self.random));
        match self.strategy {
            Strategy::Null => Box::new(NullInterval),
            Strategy::Constant { interval } => Box::new(ConstantInterval::new(interval, jitter)),
            Strategy::Exponential {
                min_interval,
                max_interval,
                multiplier,
            } => Box::new(ExponentialInterval::new(
                min_interval,
                max_interval,
                multiplier,
                jitter,
            )),
        }
    }

    /// Start a retry session bound to `scope`.
    ///
    /// Cancelling `scope` ends the session. Each call builds a new interval
    /// generator and spawns a new background task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(&self, scope: &CancellationToken) -> Controller {
        let limit = match self.strategy {
            Strategy::Null => RetryLimit::Limited(0),
            _ => RetryLimit::from_max_retries(self.max_retries),
        };
        let settings = Settings {
            limit,
            max_elapsed_time: self.max_elapsed_time,
            first_attempt: self.first_attempt,
        };
        Controller::spawn(scope, self.interval_generator(), settings)
    }
}

impl Default for Policy {
    /// Same as [`Policy::exponential`].
    fn default() -> Self {
        Self::exponential()
    }
}
