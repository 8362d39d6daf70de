//! Partition factory
//!
//! Turns the last persisted checkpoint of a stream into the next partition
//! to read. Checkpoints that no longer match the stream are reported as
//! validation failures and the stream starts over.

use super::types::{Partition, PartitionKind};
use crate::catalog::{Field, Stream};
use crate::codec::codec_for;
use crate::error::{Error, Result};
use crate::shared::{SharedState, ValidationFailure};
use crate::state::{CheckpointState, OpaqueStateValue, StreamState};
use crate::types::{JsonObject, JsonValue};
use std::sync::Arc;

/// Builds and splits partitions
#[derive(Debug, Clone)]
pub struct PartitionFactory {
    shared: Arc<SharedState>,
}

impl PartitionFactory {
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Next partition of `stream`, or `None` when nothing is left to read
    ///
    /// `state` is the last persisted checkpoint; `None` or JSON null is a
    /// cold start.
    pub fn create(
        &self,
        stream: &Arc<Stream>,
        state: Option<&OpaqueStateValue>,
    ) -> Option<Partition> {
        let stream_state = self.shared.stream_state(stream.id());
        let Some(value) = state.filter(|value| !value.is_null()) else {
            return Some(cold_start(stream, stream_state));
        };

        let checkpoint = match CheckpointState::parse(value) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                self.report(ValidationFailure::InvalidState {
                    stream: stream.id().clone(),
                    message: e.to_string(),
                });
                return Some(self.reset(stream, stream_state));
            }
        };

        let pk = match &checkpoint.pk {
            None => None,
            Some(pk) => match decode_pk(stream, pk) {
                Ok(values) => Some(values),
                Err(e) => {
                    tracing::debug!(stream = %stream.id(), "Primary key checkpoint rejected: {e}");
                    self.report(ValidationFailure::InvalidPrimaryKey {
                        stream: stream.id().clone(),
                        keys: pk.keys().cloned().collect(),
                    });
                    return Some(self.reset(stream, stream_state));
                }
            },
        };

        let cursor_value = match &checkpoint.cursor {
            None => None,
            Some(cursor) => match decode_cursor(stream, cursor) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(stream = %stream.id(), "Cursor checkpoint rejected: {e}");
                    self.report(ValidationFailure::InvalidCursor {
                        stream: stream.id().clone(),
                        cursor: cursor.keys().cloned().collect::<Vec<_>>().join(", "),
                    });
                    return Some(self.reset(stream, stream_state));
                }
            },
        };

        let Some(cursor_value) = cursor_value else {
            if stream.is_incremental() {
                // A snapshot of an incremental stream always checkpoints its cursor.
                return Some(self.reset(stream, stream_state));
            }
            return pk.map(|lower| {
                Partition::new(
                    Arc::clone(stream),
                    stream_state,
                    PartitionKind::SplittableSnapshot {
                        lower_bound: Some(lower),
                        upper_bound: None,
                    },
                )
            });
        };

        let Some(cursor) = stream.cursor().cloned() else {
            return Some(self.reset(stream, stream_state));
        };

        if let Some(lower) = pk {
            return Some(Partition::new(
                Arc::clone(stream),
                stream_state,
                PartitionKind::SplittableSnapshotWithCursor {
                    lower_bound: Some(lower),
                    upper_bound: None,
                    cursor,
                    explicit_cursor_upper_bound: Some(cursor_value),
                },
            ));
        }

        let empty_at_checkpoint = cursor_value.is_null();
        // The checkpointed cursor value was already emitted.
        let partition = Partition::new(
            Arc::clone(stream),
            Arc::clone(&stream_state),
            PartitionKind::CursorIncremental {
                cursor,
                cursor_lower_bound: cursor_value,
                is_lower_bound_included: false,
                explicit_cursor_upper_bound: None,
            },
        );
        if partition.is_caught_up() {
            return None;
        }
        if empty_at_checkpoint {
            // The stream was empty when its snapshot completed.
            return Some(cold_start(stream, stream_state));
        }
        Some(partition)
    }

    /// Split `partition` at `boundaries`
    ///
    /// Returns `boundaries.len() + 1` contiguous partitions of the same kind.
    /// The first keeps the original lower bound and the last the original
    /// upper bound. Unsplittable partitions come back unchanged.
    pub fn split(
        &self,
        partition: &Partition,
        boundaries: &[OpaqueStateValue],
    ) -> Result<Vec<Partition>> {
        let stream = partition.stream();
        let piece = |kind: PartitionKind| {
            Partition::new(Arc::clone(stream), Arc::clone(partition.stream_state()), kind)
        };

        let pieces = match partition.kind() {
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => {
                return Ok(vec![partition.clone()]);
            }
            PartitionKind::SplittableSnapshot {
                lower_bound,
                upper_bound,
            } => {
                let cuts = pk_boundaries(stream, boundaries)?;
                chain(lower_bound.clone(), cuts, upper_bound.clone())
                    .map(|(lower_bound, upper_bound)| {
                        piece(PartitionKind::SplittableSnapshot {
                            lower_bound,
                            upper_bound,
                        })
                    })
                    .collect()
            }
            PartitionKind::SplittableSnapshotWithCursor {
                lower_bound,
                upper_bound,
                cursor,
                explicit_cursor_upper_bound,
            } => {
                let cuts = pk_boundaries(stream, boundaries)?;
                chain(lower_bound.clone(), cuts, upper_bound.clone())
                    .map(|(lower_bound, upper_bound)| {
                        piece(PartitionKind::SplittableSnapshotWithCursor {
                            lower_bound,
                            upper_bound,
                            cursor: cursor.clone(),
                            explicit_cursor_upper_bound: explicit_cursor_upper_bound.clone(),
                        })
                    })
                    .collect()
            }
            PartitionKind::CursorIncremental {
                cursor,
                cursor_lower_bound,
                is_lower_bound_included,
                explicit_cursor_upper_bound,
            } => {
                let cuts = boundaries
                    .iter()
                    .map(|boundary| cursor_boundary(stream, boundary))
                    .collect::<Result<Vec<_>>>()?;
                chain(
                    Some(cursor_lower_bound.clone()),
                    cuts,
                    explicit_cursor_upper_bound.clone(),
                )
                .enumerate()
                .map(|(i, (lower, upper))| {
                    piece(PartitionKind::CursorIncremental {
                        cursor: cursor.clone(),
                        cursor_lower_bound: lower.unwrap_or(JsonValue::Null),
                        is_lower_bound_included: i == 0 && *is_lower_bound_included,
                        explicit_cursor_upper_bound: upper,
                    })
                })
                .collect()
            }
        };
        Ok(pieces)
    }

    fn report(&self, failure: ValidationFailure) {
        self.shared.validation_failures().accept(failure);
    }

    /// Discard prior progress and start the stream over
    fn reset(&self, stream: &Arc<Stream>, stream_state: Arc<StreamState>) -> Partition {
        self.report(ValidationFailure::ResetStream {
            stream: stream.id().clone(),
        });
        stream_state.reset();
        cold_start(stream, stream_state)
    }
}

fn cold_start(stream: &Arc<Stream>, stream_state: Arc<StreamState>) -> Partition {
    let kind = match (stream.has_primary_key(), stream.cursor().cloned()) {
        (false, None) => PartitionKind::UnsplittableSnapshot,
        (false, Some(cursor)) => PartitionKind::UnsplittableSnapshotWithCursor { cursor },
        (true, None) => PartitionKind::SplittableSnapshot {
            lower_bound: None,
            upper_bound: None,
        },
        (true, Some(cursor)) => PartitionKind::SplittableSnapshotWithCursor {
            lower_bound: None,
            upper_bound: None,
            cursor,
            explicit_cursor_upper_bound: None,
        },
    };
    Partition::new(Arc::clone(stream), stream_state, kind)
}

/// `(lower, upper)` pairs chaining `first` through every cut to `last`
fn chain<T: Clone>(
    first: Option<T>,
    cuts: Vec<T>,
    last: Option<T>,
) -> impl Iterator<Item = (Option<T>, Option<T>)> {
    let lowers = std::iter::once(first).chain(cuts.clone().into_iter().map(Some));
    let uppers = cuts.into_iter().map(Some).chain(std::iter::once(last));
    lowers.zip(uppers)
}

/// Primary key values of a `pk` checkpoint, in key order
fn decode_pk(stream: &Stream, pk: &JsonObject) -> Result<Vec<JsonValue>> {
    let key = stream.primary_key();
    if key.is_empty() {
        return Err(Error::invalid_state(stream.label(), "stream has no primary key"));
    }
    if pk.len() != key.len() {
        return Err(Error::invalid_state(
            stream.label(),
            format!("expected {} primary key columns, got {}", key.len(), pk.len()),
        ));
    }
    key.iter()
        .map(|field| {
            let value = pk.get(&field.id).ok_or_else(|| {
                Error::invalid_state(stream.label(), format!("missing key column '{}'", field.id))
            })?;
            decode_value(field, value)
        })
        .collect()
}

/// Cursor value of a `cursor` checkpoint
fn decode_cursor(stream: &Stream, cursor: &JsonObject) -> Result<JsonValue> {
    let field = stream
        .cursor()
        .ok_or_else(|| Error::invalid_state(stream.label(), "stream has no cursor"))?;
    match cursor.iter().next() {
        Some((name, value)) if cursor.len() == 1 && *name == field.id => {
            decode_value(field, value)
        }
        _ => Err(Error::invalid_state(
            stream.label(),
            format!("expected a single '{}' cursor entry", field.id),
        )),
    }
}

fn decode_value(field: &Field, value: &JsonValue) -> Result<JsonValue> {
    codec_for(field.field_type).decode(value)
}

fn pk_boundaries(
    stream: &Stream,
    boundaries: &[OpaqueStateValue],
) -> Result<Vec<Vec<JsonValue>>> {
    boundaries
        .iter()
        .map(|boundary| {
            let pk = CheckpointState::parse(boundary)?
                .pk
                .ok_or_else(|| Error::partition(stream.label(), "split boundary has no pk"))?;
            decode_pk(stream, &pk)
        })
        .collect()
}

fn cursor_boundary(stream: &Stream, boundary: &OpaqueStateValue) -> Result<JsonValue> {
    let cursor = CheckpointState::parse(boundary)?
        .cursor
        .ok_or_else(|| Error::partition(stream.label(), "split boundary has no cursor"))?;
    decode_cursor(stream, &cursor)
}
