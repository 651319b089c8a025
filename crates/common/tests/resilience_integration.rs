//! Integration tests for `nimbus_common::resilience`.
//!
//! Exercises the counter through a full retry loop the way the request
//! executor uses it.

use std::time::Duration;

use nimbus_common::resilience::{BackoffCounter, BackoffError, BackoffStrategy};
use tokio_util::sync::CancellationToken;

/// Runs `failures` failing attempts against a budget and returns how many
/// attempts were made before giving up or succeeding.
async fn drive(counter: &mut BackoffCounter, budget: u32, failures: u32) -> (u32, bool) {
    let cancel = CancellationToken::new();
    counter.reset(budget);
    let mut attempts = 0;

    loop {
        attempts += 1;
        if attempts > failures {
            return (attempts, true);
        }
        if !counter.decrement() {
            return (attempts, false);
        }
        counter.wait_backoff(&cancel).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn budget_of_three_survives_two_failures() {
    let mut counter = BackoffCounter::new(BackoffStrategy::Fixed(Duration::from_millis(5)));
    let (attempts, succeeded) = drive(&mut counter, 3, 2).await;

    assert!(succeeded);
    assert_eq!(attempts, 3);
    assert_eq!(counter.retries(), 2);
}

#[tokio::test(start_paused = true)]
async fn budget_of_two_stops_after_second_failure() {
    let mut counter = BackoffCounter::new(BackoffStrategy::Fixed(Duration::from_millis(5)));
    let (attempts, succeeded) = drive(&mut counter, 2, u32::MAX).await;

    assert!(!succeeded);
    assert_eq!(attempts, 2);
    assert_eq!(counter.attempts_remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn delays_never_decrease_across_a_send() {
    let mut counter = BackoffCounter::new(BackoffStrategy::Exponential {
        initial_delay: Duration::from_millis(20),
        base: 3.0,
        max_delay: Duration::from_millis(500),
    });
    let cancel = CancellationToken::new();
    counter.reset(8);

    let mut observed = Vec::new();
    while counter.decrement() {
        observed.push(counter.wait_backoff(&cancel).await.unwrap());
    }

    assert_eq!(observed.len(), 7);
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(observed.last().copied(), Some(Duration::from_millis(500)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_visible_to_the_caller() {
    let mut counter = BackoffCounter::new(BackoffStrategy::Fixed(Duration::from_secs(30)));
    counter.reset(3);
    let cancel = CancellationToken::new();
    let child = cancel.child_token();

    let handle = tokio::spawn(async move {
        let result = counter.wait_backoff(&child).await;
        (result, child.is_cancelled())
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let (result, observed) = handle.await.unwrap();
    assert!(matches!(result, Err(BackoffError::Cancelled { delay, .. }) if delay == Duration::from_secs(30)));
    assert!(observed);
}
