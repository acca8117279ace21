//! Session behavior through the public API.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pacer::random::SeededRandom;
use pacer::{proceed, Controller, FirstAttempt, Policy, StopReason};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Collects the gaps between consecutive grants until the session ends.
async fn gaps(controller: &mut Controller) -> Vec<Duration> {
    let mut out = Vec::new();
    assert!(proceed(controller).await, "first grant");
    let mut prev = Instant::now();
    while proceed(controller).await {
        out.push(prev.elapsed());
        prev = Instant::now();
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_exponential_scenario_caps_at_two_minutes() {
    let policy = Policy::exponential()
        .with_min_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(120))
        .with_multiplier(2.0)
        .with_jitter(0.0);
    let mut c = policy.start(&CancellationToken::new());

    let observed = gaps(&mut c).await;

    let expected: Vec<Duration> = [500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 120_000, 120_000]
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    assert_eq!(observed, expected);
    assert_eq!(c.stop_reason(), Some(StopReason::Exhausted));
}

#[tokio::test(start_paused = true)]
async fn test_exponential_doubling_from_one_second() {
    let policy = Policy::exponential()
        .with_min_interval(Duration::from_secs(1))
        .with_max_interval(Duration::from_secs(86_400))
        .with_multiplier(2.0)
        .with_max_retries(6);
    let mut c = policy.start(&CancellationToken::new());

    let observed = gaps(&mut c).await;

    let expected: Vec<Duration> = (0..6).map(|n| Duration::from_secs(1 << n)).collect();
    assert_eq!(observed, expected);
}

#[tokio::test(start_paused = true)]
async fn test_constant_grants_are_evenly_spaced() {
    let policy = Policy::constant(Duration::from_millis(300)).with_max_retries(4);
    let mut c = policy.start(&CancellationToken::new());

    let observed = gaps(&mut c).await;

    assert_eq!(observed, vec![Duration::from_millis(300); 4]);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_delays_stay_in_bounds() {
    let policy = Policy::constant(Duration::from_secs(1))
        .with_jitter(0.25)
        .with_random(Arc::new(SeededRandom::new(17)))
        .with_max_retries(50);
    let mut c = policy.start(&CancellationToken::new());

    let observed = gaps(&mut c).await;

    assert_eq!(observed.len(), 50);
    // Timers round up to the next millisecond
    let lo = Duration::from_millis(750);
    let hi = Duration::from_millis(1_251);
    for d in &observed {
        assert!(*d >= lo && *d <= hi, "{:?} outside [{:?}, {:?}]", d, lo, hi);
    }
    assert!(observed.iter().any(|d| *d != observed[0]));
}

#[tokio::test(start_paused = true)]
async fn test_max_retries_yields_n_plus_one() {
    for n in [1u32, 2, 5, 10] {
        let policy = Policy::constant(Duration::from_millis(5)).with_max_retries(n);
        let mut c = policy.start(&CancellationToken::new());

        let mut count = 0;
        while proceed(&mut c).await {
            count += 1;
        }
        assert_eq!(count, n + 1, "max_retries = {}", n);
        for _ in 0..3 {
            assert!(!proceed(&mut c).await);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_grant_after_max_elapsed_time() {
    let policy = Policy::exponential()
        .with_min_interval(Duration::from_millis(100))
        .with_multiplier(2.0)
        .with_max_retries(0)
        .with_max_elapsed_time(Duration::from_millis(1_000));
    let start = Instant::now();
    let mut c = policy.start(&CancellationToken::new());

    let mut issued = Vec::new();
    while let Some(grant) = c.next().await {
        issued.push(start.elapsed());
        assert!(grant.elapsed < Duration::from_millis(1_000));
    }

    // 0, 100, 300, 700; the next one would be due at 1500
    let expected: Vec<Duration> = [0, 100, 300, 700].into_iter().map(Duration::from_millis).collect();
    assert_eq!(issued, expected);
    assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    assert_eq!(c.stop_reason(), Some(StopReason::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_null_policy_true_once_then_false_forever() {
    let mut c = Policy::null().start(&CancellationToken::new());

    assert!(proceed(&mut c).await);
    for _ in 0..5 {
        assert!(!proceed(&mut c).await);
    }
    c.done().await;
}

#[tokio::test(start_paused = true)]
async fn test_delayed_first_attempt() {
    let policy = Policy::constant(Duration::from_millis(40))
        .with_first_attempt(FirstAttempt::Delayed)
        .with_max_retries(1);
    let start = Instant::now();
    let mut c = policy.start(&CancellationToken::new());

    assert!(proceed(&mut c).await);
    assert_eq!(start.elapsed(), Duration::from_millis(40));
    assert!(proceed(&mut c).await);
    assert_eq!(start.elapsed(), Duration::from_millis(80));
    assert!(!proceed(&mut c).await);
}

#[tokio::test(start_paused = true)]
async fn test_stream_of_grants() {
    let policy = Policy::constant(Duration::from_millis(10)).with_max_retries(3);

    let attempts: Vec<u32> = policy
        .start(&CancellationToken::new())
        .into_stream()
        .map(|grant| grant.attempt)
        .collect()
        .await;

    assert_eq!(attempts, [0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_policy_reused_for_sequential_sessions() {
    let policy = Policy::exponential()
        .with_min_interval(Duration::from_millis(10))
        .with_multiplier(2.0)
        .with_max_retries(2);

    for _ in 0..3 {
        let mut c = policy.start(&CancellationToken::new());
        assert_eq!(
            gaps(&mut c).await,
            [10, 20].map(Duration::from_millis).to_vec()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_closes_lifetime_promptly() {
    let scope = CancellationToken::new();
    let mut c = Policy::constant(Duration::from_secs(3_600)).start(&scope);
    assert!(proceed(&mut c).await);

    let waiter = tokio::spawn(async move {
        let started = Instant::now();
        let granted = proceed(&mut c).await;
        (granted, started.elapsed(), c)
    });
    time::sleep(Duration::from_millis(20)).await;
    scope.cancel();

    let (granted, waited, c) = waiter.await.unwrap();
    assert!(!granted);
    assert!(waited < Duration::from_secs(1));
    c.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_proceed_never_true_after_cancel_under_race() {
    let policy = Policy::constant(Duration::from_micros(200)).with_max_retries(0);
    let mut set = JoinSet::new();

    for i in 0..64u64 {
        let policy = policy.clone();
        set.spawn(async move {
            let scope = CancellationToken::new();
            let mut c = policy.start(&scope);

            let canceller = {
                let scope = scope.clone();
                tokio::spawn(async move {
                    time::sleep(Duration::from_micros(500 + i * 37)).await;
                    scope.cancel();
                })
            };

            loop {
                let cancelled_before = scope.is_cancelled() || c.is_done();
                let granted = proceed(&mut c).await;
                if cancelled_before {
                    assert!(!granted, "grant delivered after cancellation");
                }
                if !granted {
                    break;
                }
            }
            assert!(c.is_done());
            canceller.await.unwrap();
            c.shutdown().await;
        });
    }

    while let Some(res) = set.join_next().await {
        res.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_background_tasks_leak_after_cancel() {
    let metrics = tokio::runtime::Handle::current().metrics();
    let before = metrics.num_alive_tasks();

    let policy = Policy::exponential().with_min_interval(Duration::from_millis(5));
    let mut set = JoinSet::new();
    for _ in 0..100 {
        let policy = policy.clone();
        set.spawn(async move {
            let scope = CancellationToken::new();
            let mut c = policy.start(&scope);
            let mut attempts = 0;
            while proceed(&mut c).await {
                attempts += 1;
                if attempts == 2 {
                    time::sleep(Duration::from_millis(13)).await;
                    scope.cancel();
                }
            }
            attempts
        });
    }
    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), 2);
    }

    let deadline = Instant::now() + Duration::from_secs(1);
    while metrics.num_alive_tasks() > before && Instant::now() < deadline {
        time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metrics.num_alive_tasks(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_controller_ends_task() {
    let metrics = tokio::runtime::Handle::current().metrics();
    let before = metrics.num_alive_tasks();

    let scope = CancellationToken::new();
    for _ in 0..10 {
        let mut c = Policy::constant(Duration::from_secs(3_600)).start(&scope);
        assert!(proceed(&mut c).await);
        drop(c);
    }
    assert!(!scope.is_cancelled());

    let deadline = Instant::now() + Duration::from_secs(1);
    while metrics.num_alive_tasks() > before && Instant::now() < deadline {
        time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metrics.num_alive_tasks(), before);
}
