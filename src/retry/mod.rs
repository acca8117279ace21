//! Retrying fallible async operations on top of a [`Controller`].
//!
//! These helpers are thin loops over [`Controller::next`]: every grant runs the
//! operation once, success ends the loop, and the session's stop conditions
//! decide when to give up. They add no pacing logic of their own.
//!
//! # Quick Start
//!
//! ```rust
//! use pacer::{retry, Policy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let calls = AtomicU32::new(0);
//! let calls = &calls;
//! let policy = Policy::exponential()
//!     .with_min_interval(Duration::from_millis(1))
//!     .with_max_retries(5);
//!
//! let value = retry(&policy, &CancellationToken::new(), |_grant| async move {
//!     match calls.fetch_add(1, Ordering::SeqCst) {
//!         0 | 1 => Err("transient"),
//!         _ => Ok(42),
//!     }
//! })
//! .await;
//!
//! assert_eq!(value, Ok(42));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # });
//! ```
//!
//! # Permanent errors
//!
//! [`retry_if`] takes a predicate that classifies errors. An error for which
//! it returns `false` is permanent and is returned at once as
//! [`RetryError::Permanent`].

mod error;

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::controller::{Controller, Grant};
use crate::policy::Policy;

pub use error::{RetryError, RetryExhausted};

/// Run `op` once per grant until it succeeds or the session ends.
///
/// Every error is treated as transient. See [`retry_if`] to stop early on
/// permanent errors.
pub async fn retry<T, E, F, Fut>(
    policy: &Policy,
    scope: &CancellationToken,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Grant) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(policy, scope, op, |_| true).await
}

/// Run `op` once per grant until it succeeds, fails permanently, or the
/// session ends.
///
/// `is_transient` is asked about every error; `false` stops immediately.
///
/// # Examples
///
/// ```rust
/// use pacer::{retry_if, Policy, RetryError};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug, PartialEq)]
/// enum ApiError {
///     Unavailable,
///     Forbidden,
/// }
///
/// # tokio_test::block_on(async {
/// let policy = Policy::constant(Duration::from_millis(1));
///
/// let result = retry_if(
///     &policy,
///     &CancellationToken::new(),
///     |_| async { Err::<(), _>(ApiError::Forbidden) },
///     |err| *err == ApiError::Unavailable,
/// )
/// .await;
///
/// assert_eq!(
///     result,
///     Err(RetryError::Permanent { error: ApiError::Forbidden, attempts: 1 })
/// );
/// # });
/// ```
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &Policy,
    scope: &CancellationToken,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Grant) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let started = Instant::now();
    let mut controller = policy.start(scope);
    let outcome = drive(&mut controller, &mut op, &is_transient, started).await;
    controller.shutdown().await;
    outcome
}

async fn drive<T, E, F, Fut, P>(
    controller: &mut Controller,
    op: &mut F,
    is_transient: &P,
    started: Instant,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Grant) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempts = 0u32;
    let mut last_error = None;

    while let Some(grant) = controller.next().await {
        attempts += 1;
        match op(grant).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_transient(&error) => {
                return Err(RetryError::Permanent { error, attempts });
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = grant.attempt,
                    last = grant.last,
                    "attempt failed with a transient error"
                );
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => Err(RetryError::Exhausted(RetryExhausted::new(
            error,
            attempts,
            started.elapsed(),
        ))),
        None => Err(RetryError::NotAttempted),
    }
}
