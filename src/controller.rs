//! Backoff controllers: one running retry session.
//!
//! A [`Controller`] is created by [`Policy::start`](crate::Policy::start). It
//! owns one interval generator and one background task that turns generated
//! delays into timed grants.
//!
//! ## Session lifecycle
//! ```text
//! Policy::start(scope) ──► Controller ──► spawn(Scheduler::run)
//!
//! loop {
//!   ├─► wait delay           (skipped for an immediate first attempt)
//!   ├─► wait for free slot   (previous grant taken by the caller)
//!   ├─► emit Grant{ attempt } under the gate
//!   ├─► attempt == max_retries?
//!   │     └─► wait until the final grant is taken ─► Exhausted
//!   └─► delay = generator.next()
//! }
//!
//! every wait also races:
//!   - lifetime cancelled  (scope cancelled, Controller cancelled or dropped) ─► Cancelled
//!   - max_elapsed_time    (deadline since start)                             ─► Expired
//!
//! on exit: phase = Closed(reason), lifetime cancelled, task ends
//! ```
//!
//! ## Rules
//! - The task is the only sender of grants and the only writer of the phase.
//! - Grants are delivered in attempt order; none is lost or duplicated.
//! - Once the lifetime is closed no grant is ever admitted, except the final
//!   grant of an exhausted session, which is closed only after it was taken.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::interval::IntervalGenerator;
use crate::policy::FirstAttempt;

/// Permission to make one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// 0 for the initial attempt, then 1, 2, ... for each retry.
    pub attempt: u32,
    /// Time since the session started when the grant was issued.
    pub elapsed: Duration,
    /// Whether the retry budget is used up after this attempt.
    pub last: bool,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The scope or the controller was cancelled, or the controller was dropped.
    Cancelled,
    /// Every allowed retry was granted and taken.
    Exhausted,
    /// The maximum elapsed time was reached.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryLimit {
    Unbounded,
    Limited(u32),
}

impl RetryLimit {
    pub(crate) fn from_max_retries(n: u32) -> Self {
        match n {
            0 => RetryLimit::Unbounded,
            n => RetryLimit::Limited(n),
        }
    }

    fn is_last(self, attempt: u32) -> bool {
        matches!(self, RetryLimit::Limited(n) if attempt >= n)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub(crate) limit: RetryLimit,
    pub(crate) max_elapsed_time: Option<Duration>,
    pub(crate) first_attempt: FirstAttempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Closed(StopReason),
}

/// Phase shared by the task and the reader.
///
/// Emitting and closing are serialised by the lock. Cancelling the lifetime
/// does not take it; a reader re-checks both the phase and the lifetime
/// before admitting a grant.
#[derive(Debug)]
struct Gate {
    phase: Mutex<Phase>,
    lifetime: CancellationToken,
}

impl Gate {
    fn new(lifetime: CancellationToken) -> Self {
        Self {
            phase: Mutex::new(Phase::Open),
            lifetime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        // Phase is a plain Copy value; a poisoned lock still holds a valid one.
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self, phase: Phase) -> bool {
        phase == Phase::Open && !self.lifetime.is_cancelled()
    }

    fn emit(&self, permit: mpsc::Permit<'_, Grant>, grant: Grant) -> bool {
        let phase = self.lock();
        if !self.is_open(*phase) {
            return false;
        }
        permit.send(grant);
        true
    }

    fn close(&self, reason: StopReason) {
        let mut phase = self.lock();
        if *phase == Phase::Open {
            *phase = Phase::Closed(reason);
        }
        self.lifetime.cancel();
    }

    fn admit(&self, grant: &Grant) -> bool {
        let phase = self.lock();
        match *phase {
            Phase::Closed(StopReason::Exhausted) => grant.last,
            phase => self.is_open(phase),
        }
    }

    fn stop_reason(&self) -> Option<StopReason> {
        match *self.lock() {
            Phase::Closed(reason) => Some(reason),
            Phase::Open if self.lifetime.is_cancelled() => Some(StopReason::Cancelled),
            Phase::Open => None,
        }
    }
}

/// A running retry session.
///
/// Ask it for permission before every attempt with [`Controller::next`] (or
/// the [`proceed`] helper). The first grant is normally immediate; later ones
/// are paced by the policy's interval generator. Once the session ends,
/// `next` returns `None` and [`Controller::done`] completes.
///
/// Dropping a controller cancels its session, so the background task never
/// outlives it. Use [`Controller::shutdown`] to also wait for the task to exit.
///
/// # Examples
///
/// ```rust
/// use pacer::Policy;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let policy = Policy::constant(Duration::from_millis(1)).with_max_retries(2);
/// let mut controller = policy.start(&CancellationToken::new());
///
/// let mut attempts = Vec::new();
/// while let Some(grant) = controller.next().await {
///     attempts.push(grant.attempt);
/// }
/// assert_eq!(attempts, [0, 1, 2]);
/// assert!(controller.is_done());
/// # });
/// ```
#[derive(Debug)]
pub struct Controller {
    grants: mpsc::Receiver<Grant>,
    gate: Arc<Gate>,
    task: Option<JoinHandle<()>>,
}

impl Controller {
    pub(crate) fn spawn(
        scope: &CancellationToken,
        generator: Box<dyn IntervalGenerator>,
        settings: Settings,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let gate = Arc::new(Gate::new(scope.child_token()));
        let scheduler = Scheduler {
            generator,
            grants: tx,
            gate: Arc::clone(&gate),
            settings,
            started: Instant::now(),
            emitted: 0,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            limit = ?settings.limit,
            max_elapsed_time = ?settings.max_elapsed_time,
            first_attempt = ?settings.first_attempt,
            "backoff session started"
        );

        let task = tokio::spawn(scheduler.run());
        Self {
            grants: rx,
            gate,
            task: Some(task),
        }
    }

    /// Wait for the next grant.
    ///
    /// Returns `None` once the session has ended. A grant that was already
    /// queued when the session was cancelled or expired is discarded.
    pub async fn next(&mut self) -> Option<Grant> {
        let grant = tokio::select! {
            biased;
            _ = self.gate.lifetime.cancelled() => None,
            grant = self.grants.recv() => grant,
        }?;
        self.gate.admit(&grant).then_some(grant)
    }

    /// Completes once the session has ended and no grant will follow.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.gate.lifetime.cancelled()
    }

    /// Whether the session has ended.
    pub fn is_done(&self) -> bool {
        self.gate.lifetime.is_cancelled()
    }

    /// Why the session ended, or `None` while it is running.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.gate.stop_reason()
    }

    /// End the session. Idempotent.
    pub fn cancel(&self) {
        self.gate.lifetime.cancel();
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// End the session and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }
    }

    /// Turn the controller into a stream of grants.
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use pacer::Policy;
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = Policy::constant(Duration::from_millis(1)).with_max_retries(3);
    /// let grants: Vec<_> = policy
    ///     .start(&CancellationToken::new())
    ///     .into_stream()
    ///     .collect()
    ///     .await;
    /// assert_eq!(grants.len(), 4);
    /// assert!(grants[3].last);
    /// # });
    /// ```
    pub fn into_stream(self) -> impl Stream<Item = Grant> + Send {
        futures::stream::unfold(self, |mut controller| async move {
            let grant = controller.next().await?;
            Some((grant, controller))
        })
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.gate.lifetime.cancel();
    }
}

/// Wait until `controller` allows another attempt.
///
/// Returns `true` when an attempt is granted and `false` once the session
/// has ended. Never returns `true` after [`Controller::done`] completed.
///
/// ```rust
/// use pacer::{proceed, Policy};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let policy = Policy::constant(Duration::from_millis(1)).with_max_retries(4);
/// let mut controller = policy.start(&CancellationToken::new());
///
/// let mut attempts = 0;
/// while proceed(&mut controller).await {
///     attempts += 1;
/// }
/// assert_eq!(attempts, 5); // initial + 4 retries
/// # });
/// ```
pub async fn proceed(controller: &mut Controller) -> bool {
    controller.next().await.is_some()
}

struct Scheduler {
    generator: Box<dyn IntervalGenerator>,
    grants: mpsc::Sender<Grant>,
    gate: Arc<Gate>,
    settings: Settings,
    started: Instant,
    emitted: u32,
}

impl Scheduler {
    async fn run(mut self) {
        let deadline = self
            .settings
            .max_elapsed_time
            .and_then(|d| self.started.checked_add(d));
        let expiry = async move {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expiry);

        let reason = self.schedule(expiry.as_mut()).await;
        self.gate.close(reason);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            ?reason,
            grants = self.emitted,
            elapsed = ?self.started.elapsed(),
            "backoff session finished"
        );
    }

    async fn schedule(&mut self, mut expiry: Pin<&mut impl Future<Output = ()>>) -> StopReason {
        let mut attempt: u32 = 0;
        let mut delay = match self.settings.first_attempt {
            FirstAttempt::Immediate => None,
            FirstAttempt::Delayed => Some(self.generator.next()),
        };

        loop {
            if let Some(delay) = delay {
                tokio::select! {
                    biased;
                    _ = self.gate.lifetime.cancelled() => return StopReason::Cancelled,
                    _ = expiry.as_mut() => return StopReason::Expired,
                    _ = time::sleep(delay) => {}
                }
            }

            let permit = tokio::select! {
                biased;
                _ = self.gate.lifetime.cancelled() => return StopReason::Cancelled,
                _ = expiry.as_mut() => return StopReason::Expired,
                permit = self.grants.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return StopReason::Cancelled,
                },
            };

            let last = self.settings.limit.is_last(attempt);
            let grant = Grant {
                attempt,
                elapsed: self.started.elapsed(),
                last,
            };
            if !self.gate.emit(permit, grant) {
                return StopReason::Cancelled;
            }
            self.emitted += 1;

            #[cfg(feature = "tracing")]
            tracing::trace!(attempt, last, ?delay, "backoff grant issued");

            if last {
                // The slot frees up once the caller has taken the final grant.
                return tokio::select! {
                    biased;
                    _ = self.gate.lifetime.cancelled() => StopReason::Cancelled,
                    _ = expiry.as_mut() => StopReason::Expired,
                    taken = self.grants.reserve() => match taken {
                        Ok(_) => StopReason::Exhausted,
                        Err(_) => StopReason::Cancelled,
                    },
                };
            }

            attempt = attempt.saturating_add(1);
            delay = Some(self.generator.next());
        }
    }
}
