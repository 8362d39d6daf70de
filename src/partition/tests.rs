//! Tests for partition module

use super::*;
use crate::catalog::{Field, FieldType, Stream, StreamIdentifier};
use crate::config::SyncConfiguration;
use crate::output::BufferingOutputConsumer;
use crate::query::{
    FromNode, InMemorySelectQuerier, LimitNode, OrderByNode, SelectNode, SelectQuerySpec,
    WhereClauseNode, WhereNode,
};
use crate::shared::{SharedState, ValidationFailure};
use crate::state::OpaqueStateValue;
use crate::types::{JsonObject, SyncMode};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const CURSOR_VALUE: &str = "2024-08-19";
const SAMPLE_SIZE: usize = 1024;

fn id() -> Field {
    Field::new("id", FieldType::Integer)
}

fn ts() -> Field {
    Field::new("ts", FieldType::Date)
}

fn msg() -> Field {
    Field::new("msg", FieldType::String)
}

fn stream(with_pk: bool, with_cursor: bool) -> Arc<Stream> {
    let pk = if with_pk { vec!["id".to_string()] } else { vec![] };
    let (sync_mode, cursor) = if with_cursor {
        (SyncMode::Incremental, Some("ts"))
    } else {
        (SyncMode::FullRefresh, None)
    };
    Arc::new(
        Stream::new(
            StreamIdentifier::with_namespace("test", "events"),
            vec![id(), ts(), msg()],
            sync_mode,
            &pk,
            cursor,
        )
        .unwrap(),
    )
}

fn factory() -> PartitionFactory {
    PartitionFactory::new(Arc::new(SharedState::new(
        SyncConfiguration::default(),
        Arc::new(InMemorySelectQuerier::new()),
        Arc::new(BufferingOutputConsumer::new()),
    )))
}

fn state(value: serde_json::Value) -> OpaqueStateValue {
    value
}

fn record(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn assert_failures(factory: &PartitionFactory, stream: &Stream, expected: Vec<ValidationFailure>) {
    assert_eq!(
        factory.shared().validation_failures().drain(stream.id()),
        expected
    );
}

fn from(stream: &Stream) -> FromNode {
    FromNode::From {
        name: stream.name().to_string(),
        namespace: stream.namespace().map(str::to_string),
    }
}

fn from_sample(stream: &Stream) -> FromNode {
    FromNode::FromSample {
        name: stream.name().to_string(),
        namespace: stream.namespace().map(str::to_string),
        sample_rate_inv_pow2: 8,
        sample_size: SAMPLE_SIZE,
    }
}

fn all_columns() -> SelectNode {
    SelectNode::SelectColumns(vec![id(), ts(), msg()])
}

// ============================================================================
// Cold Start Tests
// ============================================================================

#[test]
fn test_cold_start_unsplittable_snapshot() {
    let stream = stream(false, false);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    assert_failures(&factory, &stream, vec![]);

    assert_eq!(partition.kind(), &PartitionKind::UnsplittableSnapshot);
    assert!(!partition.is_splittable());
    assert!(partition.checkpoint_columns().is_empty());
    assert_eq!(
        partition.non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream))
    );
    assert_eq!(
        partition.sampling_query(8, SAMPLE_SIZE),
        SelectQuerySpec::new(all_columns(), from_sample(&stream))
    );
    assert!(partition.resumable_query(10).is_err());
    assert!(partition.cursor_upper_bound_query().is_none());
    assert_eq!(partition.complete_state().unwrap(), json!({}));
    assert!(partition.incomplete_state(&record(json!({"id": 1}))).is_err());

    // Termination
    assert!(factory.create(&stream, Some(&state(json!({})))).is_none());
    assert_failures(&factory, &stream, vec![]);
}

#[test]
fn test_cold_start_unsplittable_snapshot_with_cursor() {
    let stream = stream(false, true);
    let factory = factory();
    let partition = factory.create(&stream, Some(&json!(null))).unwrap();
    assert_failures(&factory, &stream, vec![]);

    assert_eq!(
        partition.kind(),
        &PartitionKind::UnsplittableSnapshotWithCursor { cursor: ts() }
    );
    assert!(partition.complete_state().is_err());
    partition
        .stream_state()
        .set_cursor_upper_bound(json!(CURSOR_VALUE));

    assert_eq!(partition.cursor(), Some(&ts()));
    assert_eq!(
        partition.cursor_upper_bound_query().unwrap(),
        SelectQuerySpec::new(SelectNode::SelectColumnMaxValue(ts()), from(&stream))
    );
    assert_eq!(
        partition.non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream))
    );
    assert_eq!(
        partition.complete_state().unwrap(),
        json!({"cursor": {"ts": CURSOR_VALUE}})
    );

    // Snapshot done at the upper bound: caught up for this sync
    assert!(factory
        .create(&stream, Some(&partition.complete_state().unwrap()))
        .is_none());
}

#[test]
fn test_cold_start_splittable_snapshot() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    assert_failures(&factory, &stream, vec![]);

    assert!(partition.is_splittable());
    assert_eq!(partition.checkpoint_columns(), vec![id()]);
    assert!(partition.lower_bound().is_none());
    assert!(partition.upper_bound().is_none());
    assert_eq!(
        partition.non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream))
    );
    assert_eq!(
        partition.resumable_query(10).unwrap(),
        SelectQuerySpec::new(all_columns(), from(&stream))
            .with_order_by(OrderByNode::OrderBy(vec![id()]))
            .with_limit(LimitNode::Limit(10))
    );
    assert_eq!(
        partition.sampling_query(8, SAMPLE_SIZE),
        SelectQuerySpec::new(all_columns(), from_sample(&stream))
            .with_order_by(OrderByNode::OrderBy(vec![id()]))
    );
    assert_eq!(partition.complete_state().unwrap(), json!({}));
    assert_eq!(
        partition
            .incomplete_state(&record(json!({"id": 22, "ts": null, "msg": "x"})))
            .unwrap(),
        json!({"pk": {"id": 22}})
    );

    let splits = factory
        .split(
            &partition,
            &[json!({"pk": {"id": 22}}), json!({"pk": {"id": 44}})],
        )
        .unwrap();
    assert_eq!(splits.len(), 3);
    for split in &splits {
        assert_eq!(split.checkpoint_columns(), vec![id()]);
        assert!(Arc::ptr_eq(split.stream(), &stream));
        assert!(Arc::ptr_eq(split.stream_state(), partition.stream_state()));
    }
    assert_eq!(splits[0].lower_bound(), None);
    assert_eq!(splits[0].upper_bound(), Some(vec![json!(22)]));
    assert_eq!(splits[1].lower_bound(), Some(vec![json!(22)]));
    assert_eq!(splits[1].upper_bound(), Some(vec![json!(44)]));
    assert_eq!(splits[2].lower_bound(), Some(vec![json!(44)]));
    assert_eq!(splits[2].upper_bound(), None);

    assert_eq!(
        splits[1].non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream)).with_where(WhereNode::Where(
            WhereClauseNode::And(vec![
                WhereClauseNode::Greater(id(), json!(22)),
                WhereClauseNode::LesserOrEqual(id(), json!(44)),
            ])
        ))
    );
}

#[test]
fn test_cold_start_splittable_snapshot_with_cursor() {
    let stream = stream(true, true);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    assert_failures(&factory, &stream, vec![]);
    partition
        .stream_state()
        .set_cursor_upper_bound(json!(CURSOR_VALUE));

    assert_eq!(partition.checkpoint_columns(), vec![id()]);
    assert_eq!(partition.cursor(), Some(&ts()));
    assert_eq!(
        partition.cursor_upper_bound_query().unwrap(),
        SelectQuerySpec::new(SelectNode::SelectColumnMaxValue(ts()), from(&stream))
    );
    assert_eq!(
        partition.complete_state().unwrap(),
        json!({"cursor": {"ts": CURSOR_VALUE}})
    );
    assert_eq!(
        partition
            .incomplete_state(&record(json!({"id": 22, "ts": "2024-01-01", "msg": "x"})))
            .unwrap(),
        json!({"pk": {"id": 22}, "cursor": {"ts": CURSOR_VALUE}})
    );

    let splits = factory
        .split(
            &partition,
            &[json!({"pk": {"id": 22}}), json!({"pk": {"id": 44}})],
        )
        .unwrap();
    assert_eq!(splits.len(), 3);
    for split in &splits {
        assert_eq!(split.cursor(), Some(&ts()));
        assert_eq!(split.cursor_upper_bound(), Some(json!(CURSOR_VALUE)));
    }
    assert_eq!(splits[0].upper_bound(), Some(vec![json!(22)]));
    assert_eq!(splits[2].lower_bound(), Some(vec![json!(44)]));
}

// ============================================================================
// Invalid Checkpoint Tests
// ============================================================================

#[test]
fn test_invalid_primary_key() {
    let stream = stream(false, false);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"pk": {"id": 22}}))))
        .unwrap();
    assert_failures(
        &factory,
        &stream,
        vec![
            ValidationFailure::InvalidPrimaryKey {
                stream: stream.id().clone(),
                keys: vec!["id".to_string()],
            },
            ValidationFailure::ResetStream {
                stream: stream.id().clone(),
            },
        ],
    );
    assert_eq!(partition.kind(), &PartitionKind::UnsplittableSnapshot);
}

#[test]
fn test_undecodable_primary_key() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"pk": {"id": "twenty"}}))))
        .unwrap();
    let failures = factory.shared().validation_failures().drain(stream.id());
    assert_eq!(failures.len(), 2);
    assert!(failures[1].is_reset());
    assert!(partition.lower_bound().is_none());
}

#[test]
fn test_invalid_cursor() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": CURSOR_VALUE}}))))
        .unwrap();
    assert_failures(
        &factory,
        &stream,
        vec![
            ValidationFailure::InvalidCursor {
                stream: stream.id().clone(),
                cursor: "ts".to_string(),
            },
            ValidationFailure::ResetStream {
                stream: stream.id().clone(),
            },
        ],
    );
    assert_eq!(
        partition.kind(),
        &PartitionKind::SplittableSnapshot {
            lower_bound: None,
            upper_bound: None
        }
    );
}

#[test]
fn test_malformed_state_resets_stream() {
    let stream = stream(true, true);
    let factory = factory();
    let stream_state = factory.shared().stream_state(stream.id());
    stream_state.set_fetch_size(77);

    let partition = factory.create(&stream, Some(&json!({"pk": 3}))).unwrap();

    let failures = factory.shared().validation_failures().drain(stream.id());
    assert!(matches!(failures[0], ValidationFailure::InvalidState { .. }));
    assert!(failures[1].is_reset());
    assert!(stream_state.fetch_size().is_none());
    assert!(partition.lower_bound().is_none());
}

// ============================================================================
// Warm Start Tests
// ============================================================================

#[test]
fn test_warm_start_snapshot() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"pk": {"id": 22}}))))
        .unwrap();
    assert_failures(&factory, &stream, vec![]);

    assert_eq!(partition.checkpoint_columns(), vec![id()]);
    assert_eq!(partition.lower_bound(), Some(vec![json!(22)]));
    assert!(partition.upper_bound().is_none());

    let greater = WhereNode::Where(WhereClauseNode::Greater(id(), json!(22)));
    assert_eq!(
        partition.non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream)).with_where(greater.clone())
    );
    assert_eq!(
        partition.resumable_query(10).unwrap(),
        SelectQuerySpec::new(all_columns(), from(&stream))
            .with_where(greater.clone())
            .with_order_by(OrderByNode::OrderBy(vec![id()]))
            .with_limit(LimitNode::Limit(10))
    );
    assert_eq!(
        partition.sampling_query(8, SAMPLE_SIZE),
        SelectQuerySpec::new(all_columns(), from_sample(&stream))
            .with_where(greater)
            .with_order_by(OrderByNode::OrderBy(vec![id()]))
    );
    assert_eq!(partition.complete_state().unwrap(), json!({}));
    assert_eq!(
        partition
            .incomplete_state(&record(json!({"id": 10})))
            .unwrap(),
        json!({"pk": {"id": 10}})
    );

    assert!(factory.create(&stream, Some(&json!({}))).is_none());
    assert_failures(&factory, &stream, vec![]);
}

#[test]
fn test_warm_start_snapshot_with_cursor() {
    let stream = stream(true, true);
    let factory = factory();
    let partition = factory
        .create(
            &stream,
            Some(&state(
                json!({"pk": {"id": 22}, "cursor": {"ts": CURSOR_VALUE}}),
            )),
        )
        .unwrap();
    assert_failures(&factory, &stream, vec![]);

    assert_eq!(partition.lower_bound(), Some(vec![json!(22)]));
    assert_eq!(partition.cursor_upper_bound(), Some(json!(CURSOR_VALUE)));
    assert_eq!(
        partition.complete_state().unwrap(),
        json!({"cursor": {"ts": CURSOR_VALUE}})
    );
    assert_eq!(
        partition
            .incomplete_state(&record(json!({"id": 44, "ts": "2020-01-01", "msg": ""})))
            .unwrap(),
        json!({"pk": {"id": 44}, "cursor": {"ts": CURSOR_VALUE}})
    );

    // Snapshot done: transition to the incremental phase
    let next = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": CURSOR_VALUE}}))))
        .unwrap();
    assert_failures(&factory, &stream, vec![]);
    assert_eq!(
        next.kind(),
        &PartitionKind::CursorIncremental {
            cursor: ts(),
            cursor_lower_bound: json!(CURSOR_VALUE),
            is_lower_bound_included: false,
            explicit_cursor_upper_bound: None,
        }
    );
}

#[test]
fn test_incremental_stream_without_cursor_in_state_resets() {
    let stream = stream(true, true);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"pk": {"id": 3}}))))
        .unwrap();
    assert_failures(
        &factory,
        &stream,
        vec![ValidationFailure::ResetStream {
            stream: stream.id().clone(),
        }],
    );
    assert!(partition.lower_bound().is_none());
}

// ============================================================================
// Cursor Incremental Tests
// ============================================================================

#[test]
fn test_cursor_incremental() {
    let stream = stream(false, true);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": CURSOR_VALUE}}))))
        .unwrap();
    assert_failures(&factory, &stream, vec![]);
    let upper = "2024-09-19";
    partition.stream_state().set_cursor_upper_bound(json!(upper));

    assert_eq!(partition.cursor(), Some(&ts()));
    assert_eq!(partition.checkpoint_columns(), vec![ts()]);
    assert_eq!(partition.lower_bound(), Some(vec![json!(CURSOR_VALUE)]));
    assert_eq!(partition.upper_bound(), Some(vec![json!(upper)]));

    let range = WhereNode::Where(WhereClauseNode::And(vec![
        WhereClauseNode::Greater(ts(), json!(CURSOR_VALUE)),
        WhereClauseNode::LesserOrEqual(ts(), json!(upper)),
    ]));
    assert_eq!(
        partition.non_resumable_query(),
        SelectQuerySpec::new(all_columns(), from(&stream)).with_where(range.clone())
    );
    assert_eq!(
        partition.resumable_query(10).unwrap(),
        SelectQuerySpec::new(all_columns(), from(&stream))
            .with_where(range.clone())
            .with_order_by(OrderByNode::OrderBy(vec![ts()]))
            .with_limit(LimitNode::Limit(10))
    );
    assert_eq!(
        partition.sampling_query(8, SAMPLE_SIZE),
        SelectQuerySpec::new(all_columns(), from_sample(&stream))
            .with_where(range)
            .with_order_by(OrderByNode::OrderBy(vec![ts()]))
    );
    assert_eq!(
        partition.complete_state().unwrap(),
        json!({"cursor": {"ts": upper}})
    );
    assert_eq!(
        partition
            .incomplete_state(&record(json!({"id": 1, "ts": "2024-08-20", "msg": ""})))
            .unwrap(),
        json!({"cursor": {"ts": "2024-08-20"}})
    );

    // The checkpointed row was already emitted
    let next = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": "2024-08-20"}}))))
        .unwrap();
    assert!(matches!(
        next.kind(),
        PartitionKind::CursorIncremental {
            is_lower_bound_included: false,
            ..
        }
    ));
    assert!(!next.is_caught_up());

    // Caught up
    assert!(factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": upper}}))))
        .is_none());
    assert_failures(&factory, &stream, vec![]);
}

#[test]
fn test_cursor_incremental_split() {
    let stream = stream(false, true);
    let factory = factory();
    let resumed = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": CURSOR_VALUE}}))))
        .unwrap();
    let upper = "2024-09-19";
    resumed.stream_state().set_cursor_upper_bound(json!(upper));
    let partition = Partition::new(
        Arc::clone(&stream),
        Arc::clone(resumed.stream_state()),
        PartitionKind::CursorIncremental {
            cursor: ts(),
            cursor_lower_bound: json!(CURSOR_VALUE),
            is_lower_bound_included: true,
            explicit_cursor_upper_bound: None,
        },
    );

    let splits = factory
        .split(
            &partition,
            &[
                json!({"cursor": {"ts": "2024-08-20"}}),
                json!({"cursor": {"ts": "2024-08-21"}}),
            ],
        )
        .unwrap();

    assert_eq!(splits.len(), 3);
    let included: Vec<_> = splits
        .iter()
        .map(|split| match split.kind() {
            PartitionKind::CursorIncremental {
                is_lower_bound_included,
                ..
            } => *is_lower_bound_included,
            _ => panic!("unexpected partition {split}"),
        })
        .collect();
    assert_eq!(included, vec![true, false, false]);

    assert_eq!(splits[0].lower_bound(), Some(vec![json!(CURSOR_VALUE)]));
    assert_eq!(splits[0].cursor_upper_bound(), Some(json!("2024-08-20")));
    assert_eq!(splits[1].lower_bound(), Some(vec![json!("2024-08-20")]));
    assert_eq!(splits[1].cursor_upper_bound(), Some(json!("2024-08-21")));
    assert_eq!(splits[2].lower_bound(), Some(vec![json!("2024-08-21")]));
    assert_eq!(splits[2].cursor_upper_bound(), Some(json!(upper)));

    assert_eq!(
        splits[1].non_resumable_query().where_clause,
        WhereNode::Where(WhereClauseNode::And(vec![
            WhereClauseNode::Greater(ts(), json!("2024-08-20")),
            WhereClauseNode::LesserOrEqual(ts(), json!("2024-08-21")),
        ]))
    );

    // An exclusive range stays exclusive on every piece
    let splits = factory
        .split(&resumed, &[json!({"cursor": {"ts": "2024-08-20"}})])
        .unwrap();
    assert!(splits.iter().all(|split| matches!(
        split.kind(),
        PartitionKind::CursorIncremental {
            is_lower_bound_included: false,
            ..
        }
    )));
}

#[test]
fn test_cursor_at_or_past_upper_bound_is_caught_up() {
    let stream = stream(false, true);
    let factory = factory();
    factory
        .shared()
        .stream_state(stream.id())
        .set_cursor_upper_bound(json!("2024-01-01"));

    assert!(factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": "2024-02-01"}}))))
        .is_none());
}

#[test]
fn test_is_caught_up_once_upper_bound_is_known() {
    let stream = stream(false, true);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": CURSOR_VALUE}}))))
        .unwrap();
    assert!(!partition.is_caught_up());

    partition
        .stream_state()
        .set_cursor_upper_bound(json!(CURSOR_VALUE));
    assert!(partition.is_caught_up());
    assert_eq!(
        partition.complete_state().unwrap(),
        json!({"cursor": {"ts": CURSOR_VALUE}})
    );

    let snapshot = factory.create(&self::stream(true, true), None).unwrap();
    assert!(!snapshot.is_caught_up());
}

#[test]
fn test_null_cursor_checkpoint() {
    let stream = stream(true, true);
    let factory = factory();

    // Same sync: the empty table's upper bound is null as well
    factory
        .shared()
        .stream_state(stream.id())
        .set_cursor_upper_bound(json!(null));
    assert!(factory
        .create(&stream, Some(&state(json!({"cursor": {"ts": null}}))))
        .is_none());

    // Next sync starts over
    let fresh = self::factory();
    let partition = fresh
        .create(&stream, Some(&state(json!({"cursor": {"ts": null}}))))
        .unwrap();
    assert!(matches!(
        partition.kind(),
        PartitionKind::SplittableSnapshotWithCursor { .. }
    ));
    assert_failures(&fresh, &stream, vec![]);
}

// ============================================================================
// Split Tests
// ============================================================================

#[test]
fn test_split_unsplittable_returns_itself() {
    let stream = stream(false, false);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    let splits = factory.split(&partition, &[json!({"pk": {"id": 1}})]).unwrap();
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].kind(), partition.kind());
}

#[test]
fn test_split_ranges_chain_without_gaps() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory
        .create(&stream, Some(&state(json!({"pk": {"id": 5}}))))
        .unwrap();
    let boundaries: Vec<_> = [10, 20, 30, 40]
        .iter()
        .map(|id| json!({"pk": {"id": id}}))
        .collect();

    let splits = factory.split(&partition, &boundaries).unwrap();

    assert_eq!(splits.len(), boundaries.len() + 1);
    assert_eq!(splits[0].lower_bound(), partition.lower_bound());
    assert_eq!(splits.last().unwrap().upper_bound(), partition.upper_bound());
    for pair in splits.windows(2) {
        assert_eq!(pair[0].upper_bound(), pair[1].lower_bound());
    }
}

#[test]
fn test_split_piece_checkpoints_at_its_upper_bound() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();

    let pieces = factory
        .split(&partition, &[json!({"pk": {"id": 100}})])
        .unwrap();
    assert_eq!(pieces.len(), 2);
    assert_eq!(
        pieces[0].complete_state().unwrap(),
        json!({"pk": {"id": 100}})
    );
    assert_eq!(pieces[1].complete_state().unwrap(), json!({}));

    // Resuming from the first piece reads the rest of the table
    let next = factory
        .create(&stream, Some(&pieces[0].complete_state().unwrap()))
        .unwrap();
    assert_failures(&factory, &stream, vec![]);
    assert_eq!(
        next.kind(),
        &PartitionKind::SplittableSnapshot {
            lower_bound: Some(vec![json!(100)]),
            upper_bound: None,
        }
    );
}

#[test]
fn test_split_piece_with_cursor_continues_snapshot() {
    let stream = stream(true, true);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    partition
        .stream_state()
        .set_cursor_upper_bound(json!(CURSOR_VALUE));

    let pieces = factory
        .split(
            &partition,
            &[json!({"pk": {"id": 10}}), json!({"pk": {"id": 20}})],
        )
        .unwrap();
    assert_eq!(pieces.len(), 3);

    let middle = pieces[1].complete_state().unwrap();
    assert_eq!(
        middle,
        json!({"pk": {"id": 20}, "cursor": {"ts": CURSOR_VALUE}})
    );

    // The snapshot goes on past the piece; no jump to the incremental phase
    let next = factory.create(&stream, Some(&middle)).unwrap();
    assert_failures(&factory, &stream, vec![]);
    assert_eq!(
        next.kind(),
        &PartitionKind::SplittableSnapshotWithCursor {
            lower_bound: Some(vec![json!(20)]),
            upper_bound: None,
            cursor: ts(),
            explicit_cursor_upper_bound: Some(json!(CURSOR_VALUE)),
        }
    );

    // Only the last piece completes the snapshot
    assert_eq!(
        pieces[2].complete_state().unwrap(),
        json!({"cursor": {"ts": CURSOR_VALUE}})
    );
}

#[test]
fn test_split_rejects_foreign_boundary() {
    let stream = stream(true, false);
    let factory = factory();
    let partition = factory.create(&stream, None).unwrap();
    assert!(factory
        .split(&partition, &[json!({"cursor": {"ts": CURSOR_VALUE}})])
        .is_err());
    assert!(factory
        .split(&partition, &[json!({"pk": {"other": 1}})])
        .is_err());
}

#[test]
fn test_partition_display() {
    let stream = stream(true, false);
    let partition = factory().create(&stream, None).unwrap();
    assert_eq!(partition.to_string(), "SplittableSnapshot(test.events)");
}
