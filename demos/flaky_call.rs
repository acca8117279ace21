//! Flaky Call Example
//!
//! Paces calls to a service that fails a few times before it recovers.
//! Shows practical patterns including:
//! - Driving a controller by hand with `proceed`
//! - The `retry` and `retry_if` helpers
//! - Stopping a session from the outside through its scope
//!
//! Run with: cargo run --example flaky_call

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pacer::{proceed, retry, retry_if, Policy, RetryError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, PartialEq)]
enum ServiceError {
    Unavailable,
    Rejected,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Unavailable => write!(f, "service unavailable"),
            ServiceError::Rejected => write!(f, "request rejected"),
        }
    }
}

/// Fails with `Unavailable` until `calls` reaches `recover_after`.
fn call_service(calls: &AtomicU32, recover_after: u32) -> Result<&'static str, ServiceError> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    if n < recover_after {
        Err(ServiceError::Unavailable)
    } else {
        Ok("pong")
    }
}

// ==================== Manual Loop ====================

async fn example_manual_loop() {
    println!("\n=== Example 1: Manual Loop ===");

    let policy = Policy::exponential()
        .with_min_interval(Duration::from_millis(50))
        .with_max_interval(Duration::from_millis(400))
        .with_multiplier(2.0)
        .with_jitter(0.2)
        .with_max_retries(6);

    let scope = CancellationToken::new();
    let mut controller = policy.start(&scope);
    let calls = AtomicU32::new(0);

    while proceed(&mut controller).await {
        match call_service(&calls, 3) {
            Ok(reply) => {
                println!("  reply: {}", reply);
                break;
            }
            Err(e) => println!("  attempt {} failed: {:?}", calls.load(Ordering::SeqCst), e),
        }
    }
    controller.shutdown().await;
}

// ==================== Retry Helper ====================

async fn example_retry_helper() {
    println!("\n=== Example 2: Retry Helper ===");

    let calls = AtomicU32::new(0);
    let calls = &calls;
    let policy = Policy::constant(Duration::from_millis(100)).with_max_retries(2);

    let result = retry(&policy, &CancellationToken::new(), |grant| async move {
        println!("  attempt #{} after {:?}", grant.attempt, grant.elapsed);
        call_service(calls, 10)
    })
    .await;

    match result {
        Ok(reply) => println!("  reply: {}", reply),
        Err(e) => println!("  gave up: {}", e),
    }
}

// ==================== Permanent Errors ====================

async fn example_permanent_error() {
    println!("\n=== Example 3: Permanent Errors ===");

    let policy = Policy::constant(Duration::from_millis(100));

    let result = retry_if(
        &policy,
        &CancellationToken::new(),
        |_| async { Err::<(), _>(ServiceError::Rejected) },
        |e| *e == ServiceError::Unavailable,
    )
    .await;

    if let Err(RetryError::Permanent { error, attempts }) = result {
        println!("  rejected after {} attempt(s): {:?}", attempts, error);
    }
}

// ==================== Cancellation ====================

async fn example_cancellation() {
    println!("\n=== Example 4: Cancellation ===");

    let scope = CancellationToken::new();
    let policy = Policy::constant(Duration::from_millis(200)).with_max_retries(0);
    let mut controller = policy.start(&scope);

    tokio::spawn({
        let scope = scope.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(650)).await;
            println!("  shutting down");
            scope.cancel();
        }
    });

    let mut attempts = 0;
    while proceed(&mut controller).await {
        attempts += 1;
    }
    println!(
        "  {} attempts, stopped: {:?}",
        attempts,
        controller.stop_reason()
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    example_manual_loop().await;
    example_retry_helper().await;
    example_permanent_error().await;
    example_cancellation().await;
}
