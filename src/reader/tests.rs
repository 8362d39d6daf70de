//! Tests for reader module

use super::*;
use crate::catalog::{Field, FieldType, Stream, StreamIdentifier};
use crate::config::{LimitPolicy, SyncConfiguration};
use crate::output::{BufferingOutputConsumer, OutputConsumer};
use crate::partition::{Partition, PartitionFactory};
use crate::query::{InMemorySelectQuerier, SelectQuerier};
use crate::shared::{SharedState, TryAcquireResourcesStatus};
use crate::state::OpaqueStateValue;
use crate::types::{JsonObject, SyncMode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Fixture {
    querier: Arc<InMemorySelectQuerier>,
    output: Arc<BufferingOutputConsumer>,
    shared: Arc<SharedState>,
    stream: Arc<Stream>,
}

impl Fixture {
    fn new(rows: usize) -> Self {
        Self::with(InMemorySelectQuerier::new(), BufferingOutputConsumer::new(), rows)
    }

    fn with(querier: InMemorySelectQuerier, output: BufferingOutputConsumer, rows: usize) -> Self {
        let stream = Arc::new(
            Stream::new(
                StreamIdentifier::with_namespace("test", "events"),
                vec![
                    Field::new("id", FieldType::Integer),
                    Field::new("msg", FieldType::String),
                ],
                SyncMode::FullRefresh,
                &["id".to_string()],
                None,
            )
            .unwrap(),
        );
        querier.set_rows(stream.id().clone(), (1..=rows).map(row).collect());

        let mut configuration = SyncConfiguration {
            resource_acquisition_heartbeat: 10,
            ..SyncConfiguration::default()
        };
        configuration.constants.limit_policy = LimitPolicy {
            initial: 4,
            minimum: 2,
            maximum: 16,
            factor: 2,
        };

        let querier = Arc::new(querier);
        let output = Arc::new(output);
        let shared = Arc::new(SharedState::new(
            configuration,
            Arc::clone(&querier) as Arc<dyn SelectQuerier>,
            Arc::clone(&output) as Arc<dyn OutputConsumer>,
        ));
        Self {
            querier,
            output,
            shared,
            stream,
        }
    }

    fn partition(&self, state: Option<OpaqueStateValue>) -> Partition {
        PartitionFactory::new(Arc::clone(&self.shared))
            .create(&self.stream, state.as_ref())
            .unwrap()
    }

    fn emitted_ids(&self) -> Vec<i64> {
        self.output
            .records()
            .iter()
            .map(|r| r.data["id"].as_i64().unwrap())
            .collect()
    }
}

fn row(id: usize) -> JsonObject {
    json!({"id": id, "msg": format!("message {id}")})
        .as_object()
        .cloned()
        .unwrap()
}

// ============================================================================
// Non-Resumable Tests
// ============================================================================

#[tokio::test]
async fn test_non_resumable_reads_everything() {
    let fixture = Fixture::new(10);
    fixture.shared.stream_state(fixture.stream.id()).set_fetch_size(500);
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    assert!(!reader.is_resumable());

    assert_eq!(
        reader.try_acquire_resources().await,
        TryAcquireResourcesStatus::ReadyToRun
    );
    reader.run(CancellationToken::new()).await.unwrap();
    let checkpoint = reader.checkpoint().unwrap().unwrap();
    reader.release_resources();

    assert_eq!(checkpoint.state, json!({}));
    assert_eq!(checkpoint.record_count, 10);
    assert_eq!(fixture.emitted_ids().len(), 10);
    assert!(reader.counters().is_consistent());

    let (_, parameters) = fixture.querier.executed().pop().unwrap();
    assert!(parameters.reuse_result_object);
    assert_eq!(parameters.fetch_size, Some(500));
}

#[tokio::test]
async fn test_split_piece_checkpoints_at_upper_bound() {
    let fixture = Fixture::new(10);
    let pieces = PartitionFactory::new(Arc::clone(&fixture.shared))
        .split(&fixture.partition(None), &[json!({"pk": {"id": 3}})])
        .unwrap();
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), pieces[0].clone());

    assert_eq!(
        reader.try_acquire_resources().await,
        TryAcquireResourcesStatus::ReadyToRun
    );
    reader.run(CancellationToken::new()).await.unwrap();
    let checkpoint = reader.checkpoint().unwrap().unwrap();
    reader.release_resources();

    assert_eq!(checkpoint.state, json!({"pk": {"id": 3}}));
    assert_eq!(checkpoint.record_count, 3);
    assert_eq!(fixture.emitted_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_run_without_resources_fails() {
    let fixture = Fixture::new(3);
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));

    let err = reader.run(CancellationToken::new()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(fixture.querier.executed().is_empty());
}

#[tokio::test]
async fn test_permit_released_once() {
    let fixture = Fixture::new(3);
    let mut first =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    let mut second =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));

    assert_eq!(
        first.try_acquire_resources().await,
        TryAcquireResourcesStatus::ReadyToRun
    );
    // Acquiring twice keeps the same permit
    assert_eq!(
        first.try_acquire_resources().await,
        TryAcquireResourcesStatus::ReadyToRun
    );
    assert_eq!(
        second.try_acquire_resources().await,
        TryAcquireResourcesStatus::RetryLater
    );

    first.release_resources();
    first.release_resources();
    assert_eq!(fixture.shared.resources().available(), 1);
    assert_eq!(
        second.try_acquire_resources().await,
        TryAcquireResourcesStatus::ReadyToRun
    );
    drop(second);
    assert_eq!(fixture.shared.resources().available(), 1);
}

#[tokio::test]
async fn test_non_resumable_cancelled_has_no_checkpoint() {
    let fixture = Fixture::new(5);
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    reader.run(cancel).await.unwrap();

    assert!(reader.checkpoint().unwrap().is_none());
    assert!(fixture.emitted_ids().is_empty());
}

#[tokio::test]
async fn test_query_failure_has_no_checkpoint() {
    let fixture = Fixture::new(5);
    fixture.querier.fail_next("connection reset");
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;

    assert!(reader.run(CancellationToken::new()).await.is_err());
    assert!(reader.checkpoint().unwrap().is_none());
    reader.release_resources();
    assert_eq!(fixture.shared.resources().available(), 1);
}

#[tokio::test]
async fn test_discarded_records_are_counted() {
    let fixture = Fixture::with(
        InMemorySelectQuerier::new(),
        BufferingOutputConsumer::with_filter(|r| r.data["id"].as_i64() != Some(2)),
        4,
    );
    let mut reader =
        NonResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;
    reader.run(CancellationToken::new()).await.unwrap();

    let counters = reader.counters();
    assert_eq!(counters.events, 4);
    assert_eq!(counters.emitted, 3);
    assert_eq!(counters.discarded, 1);
    assert!(counters.is_consistent());
    assert_eq!(reader.checkpoint().unwrap().unwrap().record_count, 3);
}

// ============================================================================
// Resumable Tests
// ============================================================================

#[tokio::test]
async fn test_resumable_chunks_and_limit_growth() {
    let fixture = Fixture::new(10);
    let stream_state = fixture.shared.stream_state(fixture.stream.id());

    let mut reader =
        ResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    assert!(reader.is_resumable());
    reader.try_acquire_resources().await;
    reader.run(CancellationToken::new()).await.unwrap();
    let first = reader.checkpoint().unwrap().unwrap();
    reader.release_resources();

    assert_eq!(first.state, json!({"pk": {"id": 4}}));
    assert_eq!(first.record_count, 4);
    assert_eq!(stream_state.limit().current(), 8);

    // Checkpointing again does not adjust the limit twice
    assert_eq!(reader.checkpoint().unwrap().unwrap(), first);
    assert_eq!(stream_state.limit().current(), 8);

    let mut reader = ResumablePartitionReader::new(
        Arc::clone(&fixture.shared),
        fixture.partition(Some(first.state)),
    );
    reader.try_acquire_resources().await;
    reader.run(CancellationToken::new()).await.unwrap();
    let second = reader.checkpoint().unwrap().unwrap();

    assert_eq!(second.state, json!({}));
    assert_eq!(second.record_count, 6);
    assert_eq!(stream_state.limit().current(), 8);
    assert_eq!(fixture.emitted_ids(), (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_resumable_cancelled_before_first_row() {
    let fixture = Fixture::new(10);
    let mut reader =
        ResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    reader.run(cancel).await.unwrap();

    assert!(reader.checkpoint().unwrap().is_none());
    assert_eq!(
        fixture.shared.stream_state(fixture.stream.id()).limit().current(),
        2
    );
}

#[tokio::test]
async fn test_resumable_cancelled_mid_read() {
    let fixture = Fixture::with(
        InMemorySelectQuerier::new().with_row_delay(Duration::from_millis(30)),
        BufferingOutputConsumer::new(),
        100,
    );
    fixture
        .shared
        .stream_state(fixture.stream.id())
        .update_limit(|limit| limit.up().up());
    let mut reader =
        ResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    reader.run(cancel).await.unwrap();

    let emitted = fixture.emitted_ids();
    assert!(!emitted.is_empty());
    assert!(emitted.len() < 16);
    let checkpoint = reader.checkpoint().unwrap().unwrap();
    assert_eq!(
        checkpoint.state,
        json!({"pk": {"id": emitted.last().unwrap()}})
    );
    assert_eq!(checkpoint.record_count, emitted.len() as u64);
    assert_eq!(
        fixture.shared.stream_state(fixture.stream.id()).limit().current(),
        8
    );
}

#[tokio::test]
async fn test_resumable_run_future_dropped() {
    let fixture = Fixture::with(
        InMemorySelectQuerier::new().with_row_delay(Duration::from_millis(30)),
        BufferingOutputConsumer::new(),
        100,
    );
    let mut reader =
        ResumablePartitionReader::new(Arc::clone(&fixture.shared), fixture.partition(None));
    reader.try_acquire_resources().await;

    let timed_out = tokio::time::timeout(
        Duration::from_millis(75),
        reader.run(CancellationToken::new()),
    )
    .await;
    assert!(timed_out.is_err());

    let emitted = fixture.emitted_ids();
    assert_eq!(reader.counters().emitted, emitted.len() as u64);
    match reader.checkpoint().unwrap() {
        Some(checkpoint) => assert_eq!(
            checkpoint.state,
            json!({"pk": {"id": emitted.last().unwrap()}})
        ),
        None => assert!(emitted.is_empty()),
    }
}

// ============================================================================
// Checkpoint Only Tests
// ============================================================================

#[test]
fn test_checkpoint_only_reader() {
    let fixture = Fixture::new(0);
    let mut reader = CheckpointOnlyPartitionReader::new(fixture.partition(None));

    tokio_test::block_on(async {
        assert_eq!(
            reader.try_acquire_resources().await,
            TryAcquireResourcesStatus::ReadyToRun
        );
        reader.run(CancellationToken::new()).await.unwrap();
    });

    let checkpoint = reader.checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.state, json!({}));
    assert_eq!(checkpoint.record_count, 0);
    assert_eq!(reader.counters(), ReadCounters::default());
    assert!(fixture.querier.executed().is_empty());
}
