//! # Pacer
//!
//! > *"Try again, but not all at once"*
//!
//! Backoff pacing for async Rust: interval generators paired with
//! cancellable controllers that hand out permission to retry.
//!
//! ## Philosophy
//!
//! **Pacer** splits retrying into a pure part and a running part:
//! - **Interval generators** are plain state machines: attempt state in, next delay out
//! - **Controllers** own one generator and one background task that turns
//!   delays into timed grants, and stop on retry budget, elapsed time or cancellation
//!
//! ## Quick Example
//!
//! ```rust
//! use pacer::{proceed, Policy};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let policy = Policy::exponential()
//!     .with_min_interval(Duration::from_millis(1))
//!     .with_max_interval(Duration::from_millis(8))
//!     .with_multiplier(2.0)
//!     .with_jitter(0.1)
//!     .with_max_retries(3);
//!
//! let scope = CancellationToken::new();
//! let mut controller = policy.start(&scope);
//!
//! let mut attempts = 0;
//! while proceed(&mut controller).await {
//!     attempts += 1;
//!     // call the flaky operation here, break on success
//! }
//! assert_eq!(attempts, 4);
//! # });
//! ```
//!
//! ## Session rules
//!
//! - The first grant is immediate unless [`FirstAttempt::Delayed`] is configured.
//! - `max_retries = N` yields exactly `N + 1` grants; `0` means unbounded.
//! - No grant is delivered after `max_elapsed_time` or after cancellation.
//! - Dropping or cancelling a [`Controller`] ends its background task.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod interval;
pub mod jitter;
pub mod random;

mod config;
mod controller;
mod policy;
mod retry;

// Re-exports
pub use config::PolicyConfig;
pub use controller::{proceed, Controller, Grant, StopReason};
pub use policy::{
    FirstAttempt, Policy, Strategy, DEFAULT_INTERVAL, DEFAULT_MAX_INTERVAL, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_INTERVAL,
};
pub use retry::{retry, retry_if, RetryError, RetryExhausted};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::controller::{proceed, Controller, Grant, StopReason};
    pub use crate::policy::{FirstAttempt, Policy, Strategy};
    pub use crate::retry::{retry, retry_if, RetryError};
}
