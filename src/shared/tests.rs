//! Tests for shared module

use super::*;
use crate::catalog::StreamIdentifier;
use crate::config::SyncConfiguration;
use crate::output::BufferingOutputConsumer;
use crate::query::InMemorySelectQuerier;
use std::sync::Arc;
use std::time::Duration;

fn shared_state(max_concurrency: usize) -> SharedState {
    let configuration = SyncConfiguration {
        max_concurrency,
        resource_acquisition_heartbeat: 10,
        ..SyncConfiguration::default()
    };
    SharedState::new(
        configuration,
        Arc::new(InMemorySelectQuerier::new()),
        Arc::new(BufferingOutputConsumer::new()),
    )
}

// ============================================================================
// Resource Pool Tests
// ============================================================================

#[tokio::test]
async fn test_acquire_and_release_on_drop() {
    let pool = ResourcePool::new(2, Duration::from_millis(10));
    assert_eq!(pool.capacity(), 2);

    let first = pool.try_acquire().await.unwrap();
    let second = pool.try_acquire().await.unwrap();
    assert_eq!(pool.available(), 0);

    drop(first);
    assert_eq!(pool.available(), 1);
    drop(second);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_exhausted_pool_times_out() {
    let pool = ResourcePool::new(1, Duration::from_millis(10));
    let _held = pool.try_acquire().await.unwrap();

    assert!(pool.try_acquire().await.is_none());
    assert_eq!(pool.available(), 0);
}

#[tokio::test]
async fn test_waiter_gets_released_permit() {
    let pool = ResourcePool::new(1, Duration::from_secs(5));
    let held = pool.try_acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.try_acquire().await.is_some() })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(held);

    assert!(waiter.await.unwrap());
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn test_cancelled_acquire_leaks_nothing() {
    let pool = ResourcePool::new(1, Duration::from_secs(5));
    let held = pool.try_acquire().await.unwrap();

    let pending = tokio::time::timeout(Duration::from_millis(10), pool.try_acquire()).await;
    assert!(pending.is_err());

    drop(held);
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn test_resource_slot_holds_one_permit() {
    let pool = ResourcePool::new(1, Duration::from_millis(10));
    let mut slot = ResourceSlot::new(pool.clone());
    assert!(slot.ensure_held("reader").is_err());

    assert_eq!(slot.try_acquire().await, TryAcquireResourcesStatus::ReadyToRun);
    assert_eq!(slot.try_acquire().await, TryAcquireResourcesStatus::ReadyToRun);
    assert!(slot.ensure_held("reader").is_ok());
    assert_eq!(pool.available(), 0);

    let mut other = ResourceSlot::new(pool.clone());
    assert_eq!(other.try_acquire().await, TryAcquireResourcesStatus::RetryLater);

    slot.release();
    slot.release();
    assert_eq!(pool.available(), 1);
    assert!(!slot.is_held());
}

// ============================================================================
// Validation Failure Tests
// ============================================================================

#[test]
fn test_validation_failures_drained_per_stream() {
    let users = StreamIdentifier::new("users");
    let orders = StreamIdentifier::new("orders");
    let handler = ValidationFailureHandler::new();

    handler.accept(ValidationFailure::InvalidCursor {
        stream: users.clone(),
        cursor: "ts".to_string(),
    });
    handler.accept(ValidationFailure::ResetStream {
        stream: orders.clone(),
    });
    handler.accept(ValidationFailure::ResetStream {
        stream: users.clone(),
    });

    let drained = handler.drain(&users);
    assert_eq!(drained.len(), 2);
    assert!(!drained[0].is_reset());
    assert!(drained[1].is_reset());
    assert!(handler.drain(&users).is_empty());
    assert_eq!(handler.drain(&orders).len(), 1);
}

#[test]
fn test_validation_failure_display() {
    let failure = ValidationFailure::InvalidPrimaryKey {
        stream: StreamIdentifier::with_namespace("main", "users"),
        keys: vec!["a".to_string(), "b".to_string()],
    };
    assert_eq!(
        failure.to_string(),
        "Invalid primary key [a, b] in state for stream main.users"
    );
}

// ============================================================================
// Shared State Tests
// ============================================================================

#[test]
fn test_stream_state_created_once() {
    let shared = shared_state(1);
    let id = StreamIdentifier::new("users");

    let first = shared.stream_state(&id);
    first.set_fetch_size(42);
    let second = shared.stream_state(&id);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.fetch_size(), Some(42));
    assert!(shared.stream_state(&StreamIdentifier::new("orders")).fetch_size().is_none());
}

#[test]
fn test_resources_sized_to_max_concurrency() {
    let shared = shared_state(3);
    assert_eq!(shared.max_concurrency(), 3);
    assert_eq!(shared.resources().capacity(), 3);
    assert_eq!(shared.resources().heartbeat(), Duration::from_millis(10));
}
