//! Error types for retry operations.

use std::time::Duration;

/// Error returned when a session ends while the operation is still failing.
///
/// Contains the final error along with metadata about the retry sequence.
///
/// # Examples
///
/// ```rust
/// use pacer::{retry, Policy, RetryError};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let policy = Policy::constant(Duration::from_millis(1)).with_max_retries(2);
///
/// let result = retry(&policy, &CancellationToken::new(), |_| async {
///     Err::<(), _>("always fails")
/// })
/// .await;
///
/// match result {
///     Err(RetryError::Exhausted(exhausted)) => {
///         assert_eq!(exhausted.final_error, "always fails");
///         assert_eq!(exhausted.attempts, 3); // 1 initial + 2 retries
///     }
///     other => panic!("expected exhaustion, got {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Total number of attempts made (initial + retries).
    pub attempts: u32,
    /// Time from the start of the session to its end.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({:?}): {}",
            self.attempts, self.total_duration, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

/// Why [`retry`](crate::retry()) or [`retry_if`](crate::retry_if) gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed with an error classified as permanent.
    Permanent {
        /// The permanent error.
        error: E,
        /// Attempts made, including the one that failed permanently.
        attempts: u32,
    },
    /// The session ended (retry budget, elapsed time or cancellation)
    /// while the operation was still failing.
    Exhausted(RetryExhausted<E>),
    /// The session ended before the first attempt was granted.
    NotAttempted,
}

impl<E> RetryError<E> {
    /// Returns true for a permanent failure.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    /// Returns true when the session ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } => *attempts,
            Self::Exhausted(exhausted) => exhausted.attempts,
            Self::NotAttempted => 0,
        }
    }

    /// Get the last error of the operation, if it ran at all.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Permanent { error, .. } => Some(error),
            Self::Exhausted(exhausted) => Some(exhausted.into_error()),
            Self::NotAttempted => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permanent { error, attempts } => {
                write!(f, "permanent failure on attempt {}: {}", attempts, error)
            }
            Self::Exhausted(exhausted) => write!(f, "{}", exhausted),
            Self::NotAttempted => write!(f, "retry session ended before the first attempt"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Permanent { error, .. } => Some(error),
            Self::Exhausted(exhausted) => Some(exhausted),
            Self::NotAttempted => None,
        }
    }
}
