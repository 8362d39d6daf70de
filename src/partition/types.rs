//! Partition types
//!
//! Partitions are immutable. Everything a reader needs, queries as well as
//! checkpoint documents, is derived from the variant payload, the stream and
//! the stream's runtime state.

use crate::catalog::{Field, Stream};
use crate::codec::codec_for;
use crate::error::{Error, Result};
use crate::query::{
    FromNode, LimitNode, OrderByNode, SelectNode, SelectQuerySpec, WhereClauseNode, WhereNode,
};
use crate::state::{CheckpointState, OpaqueStateValue, StreamState};
use crate::types::{JsonObject, JsonValue};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Variant payload of a partition
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionKind {
    /// Full scan of a stream without primary key
    UnsplittableSnapshot,

    /// Full scan of a stream without primary key, followed by the
    /// incremental phase from the cursor upper bound
    UnsplittableSnapshotWithCursor { cursor: Field },

    /// Primary key range `(lower_bound, upper_bound]`, unbounded where `None`
    SplittableSnapshot {
        lower_bound: Option<Vec<JsonValue>>,
        upper_bound: Option<Vec<JsonValue>>,
    },

    /// Primary key range of an incremental stream
    SplittableSnapshotWithCursor {
        lower_bound: Option<Vec<JsonValue>>,
        upper_bound: Option<Vec<JsonValue>>,
        cursor: Field,
        /// Upper bound carried over from a checkpoint, else the stream's
        explicit_cursor_upper_bound: Option<JsonValue>,
    },

    /// Cursor range `[lower, upper]`, or `(lower, upper]` when the lower
    /// bound is excluded
    CursorIncremental {
        cursor: Field,
        cursor_lower_bound: JsonValue,
        is_lower_bound_included: bool,
        explicit_cursor_upper_bound: Option<JsonValue>,
    },
}

/// One unit of work over a stream
#[derive(Debug, Clone)]
pub struct Partition {
    stream: Arc<Stream>,
    stream_state: Arc<StreamState>,
    kind: PartitionKind,
}

impl Partition {
    pub fn new(stream: Arc<Stream>, stream_state: Arc<StreamState>, kind: PartitionKind) -> Self {
        Self {
            stream,
            stream_state,
            kind,
        }
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub fn stream_state(&self) -> &Arc<StreamState> {
        &self.stream_state
    }

    pub fn kind(&self) -> &PartitionKind {
        &self.kind
    }

    /// Variant name, for logging
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PartitionKind::UnsplittableSnapshot => "UnsplittableSnapshot",
            PartitionKind::UnsplittableSnapshotWithCursor { .. } => {
                "UnsplittableSnapshotWithCursor"
            }
            PartitionKind::SplittableSnapshot { .. } => "SplittableSnapshot",
            PartitionKind::SplittableSnapshotWithCursor { .. } => "SplittableSnapshotWithCursor",
            PartitionKind::CursorIncremental { .. } => "CursorIncremental",
        }
    }

    /// Whether the partition can be split and read in resumable chunks
    pub fn is_splittable(&self) -> bool {
        !matches!(
            self.kind,
            PartitionKind::UnsplittableSnapshot
                | PartitionKind::UnsplittableSnapshotWithCursor { .. }
        )
    }

    /// Columns whose values in the last row read make up a mid-range checkpoint
    pub fn checkpoint_columns(&self) -> Vec<Field> {
        match &self.kind {
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => Vec::new(),
            PartitionKind::SplittableSnapshot { .. }
            | PartitionKind::SplittableSnapshotWithCursor { .. } => {
                self.stream.primary_key().to_vec()
            }
            PartitionKind::CursorIncremental { cursor, .. } => vec![cursor.clone()],
        }
    }

    pub fn cursor(&self) -> Option<&Field> {
        match &self.kind {
            PartitionKind::UnsplittableSnapshotWithCursor { cursor }
            | PartitionKind::SplittableSnapshotWithCursor { cursor, .. }
            | PartitionKind::CursorIncremental { cursor, .. } => Some(cursor),
            PartitionKind::UnsplittableSnapshot | PartitionKind::SplittableSnapshot { .. } => None,
        }
    }

    /// Upper bound of the cursor range, `None` while not yet queried
    pub fn cursor_upper_bound(&self) -> Option<JsonValue> {
        match &self.kind {
            PartitionKind::UnsplittableSnapshotWithCursor { .. } => {
                self.stream_state.cursor_upper_bound()
            }
            PartitionKind::SplittableSnapshotWithCursor {
                explicit_cursor_upper_bound,
                ..
            }
            | PartitionKind::CursorIncremental {
                explicit_cursor_upper_bound,
                ..
            } => explicit_cursor_upper_bound
                .clone()
                .or_else(|| self.stream_state.cursor_upper_bound()),
            PartitionKind::UnsplittableSnapshot | PartitionKind::SplittableSnapshot { .. } => None,
        }
    }

    /// Lower bound over the checkpoint columns
    pub fn lower_bound(&self) -> Option<Vec<JsonValue>> {
        match &self.kind {
            PartitionKind::SplittableSnapshot { lower_bound, .. }
            | PartitionKind::SplittableSnapshotWithCursor { lower_bound, .. } => {
                lower_bound.clone()
            }
            PartitionKind::CursorIncremental {
                cursor_lower_bound, ..
            } => Some(vec![cursor_lower_bound.clone()]),
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => None,
        }
    }

    /// Upper bound over the checkpoint columns
    pub fn upper_bound(&self) -> Option<Vec<JsonValue>> {
        match &self.kind {
            PartitionKind::SplittableSnapshot { upper_bound, .. }
            | PartitionKind::SplittableSnapshotWithCursor { upper_bound, .. } => {
                upper_bound.clone()
            }
            PartitionKind::CursorIncremental { .. } => self.cursor_upper_bound().map(|v| vec![v]),
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => None,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whole range, no order, no limit
    pub fn non_resumable_query(&self) -> SelectQuerySpec {
        SelectQuerySpec::new(self.select(), self.from())
            .with_where(self.where_node())
            .optimize()
    }

    /// Range ordered by the checkpoint columns, at most `limit` rows
    pub fn resumable_query(&self, limit: u64) -> Result<SelectQuerySpec> {
        if !self.is_splittable() {
            return Err(Error::partition(
                self.stream.label(),
                format!("{} partitions cannot be read in resumable chunks", self.kind_name()),
            ));
        }
        Ok(SelectQuerySpec::new(self.select(), self.from())
            .with_where(self.where_node())
            .with_order_by(self.order_by())
            .with_limit(LimitNode::Limit(limit))
            .optimize())
    }

    /// Same range over a sampled source
    pub fn sampling_query(&self, sample_rate_inv_pow2: u32, sample_size: usize) -> SelectQuerySpec {
        let from = FromNode::FromSample {
            name: self.stream.name().to_string(),
            namespace: self.stream.namespace().map(str::to_string),
            sample_rate_inv_pow2,
            sample_size,
        };
        SelectQuerySpec::new(self.select(), from)
            .with_where(self.where_node())
            .with_order_by(self.order_by())
            .optimize()
    }

    /// `MAX(cursor)` over the whole stream, for cursor variants
    pub fn cursor_upper_bound_query(&self) -> Option<SelectQuerySpec> {
        self.cursor().map(|cursor| {
            SelectQuerySpec::new(SelectNode::SelectColumnMaxValue(cursor.clone()), self.from())
        })
    }

    fn select(&self) -> SelectNode {
        let mut columns = self.stream.fields().to_vec();
        for column in self.checkpoint_columns() {
            if !columns.iter().any(|f| f.id == column.id) {
                columns.push(column);
            }
        }
        SelectNode::SelectColumns(columns)
    }

    fn from(&self) -> FromNode {
        FromNode::From {
            name: self.stream.name().to_string(),
            namespace: self.stream.namespace().map(str::to_string),
        }
    }

    fn order_by(&self) -> OrderByNode {
        if self.is_splittable() {
            OrderByNode::OrderBy(self.checkpoint_columns())
        } else {
            OrderByNode::NoOrderBy
        }
    }

    fn where_node(&self) -> WhereNode {
        let mut conjuncts = Vec::new();
        match &self.kind {
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => {}
            PartitionKind::SplittableSnapshot {
                lower_bound,
                upper_bound,
            }
            | PartitionKind::SplittableSnapshotWithCursor {
                lower_bound,
                upper_bound,
                ..
            } => {
                let pk = self.stream.primary_key();
                if let Some(lower) = lower_bound {
                    conjuncts.push(WhereClauseNode::lower_bound(pk, lower, false));
                }
                if let Some(upper) = upper_bound {
                    conjuncts.push(WhereClauseNode::upper_bound(pk, upper));
                }
            }
            PartitionKind::CursorIncremental {
                cursor,
                cursor_lower_bound,
                is_lower_bound_included,
                ..
            } => {
                conjuncts.push(if *is_lower_bound_included {
                    WhereClauseNode::GreaterOrEqual(cursor.clone(), cursor_lower_bound.clone())
                } else {
                    WhereClauseNode::Greater(cursor.clone(), cursor_lower_bound.clone())
                });
                if let Some(upper) = self.cursor_upper_bound().filter(|v| !v.is_null()) {
                    conjuncts.push(WhereClauseNode::LesserOrEqual(cursor.clone(), upper));
                }
            }
        }
        WhereNode::Where(WhereClauseNode::And(conjuncts))
    }

    // ========================================================================
    // Checkpoints
    // ========================================================================

    /// Checkpoint once every row of the range was read
    ///
    /// A snapshot piece with a primary key upper bound checkpoints at that
    /// bound; only the last piece of a snapshot completes it.
    pub fn complete_state(&self) -> Result<OpaqueStateValue> {
        match &self.kind {
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::SplittableSnapshot {
                upper_bound: None, ..
            } => Ok(CheckpointState::snapshot_completed()),
            PartitionKind::SplittableSnapshot {
                upper_bound: Some(upper),
                ..
            } => Ok(CheckpointState::snapshot(self.encode_key(upper)?)),
            PartitionKind::SplittableSnapshotWithCursor {
                upper_bound: Some(upper),
                cursor,
                ..
            } => Ok(CheckpointState::snapshot_with_cursor(
                self.encode_key(upper)?,
                &cursor.id,
                self.required_cursor_upper_bound()?,
            )),
            PartitionKind::UnsplittableSnapshotWithCursor { cursor }
            | PartitionKind::SplittableSnapshotWithCursor { cursor, .. }
            | PartitionKind::CursorIncremental { cursor, .. } => Ok(
                CheckpointState::cursor_incremental(&cursor.id, self.required_cursor_upper_bound()?),
            ),
        }
    }

    /// Whether a cursor range starts at or past its upper bound
    ///
    /// Always false while the upper bound is unknown.
    pub fn is_caught_up(&self) -> bool {
        let PartitionKind::CursorIncremental {
            cursor,
            cursor_lower_bound,
            ..
        } = &self.kind
        else {
            return false;
        };
        match self.cursor_upper_bound() {
            None => false,
            Some(upper) if upper == *cursor_lower_bound => true,
            Some(upper) => codec_for(cursor.field_type)
                .compare(cursor_lower_bound, &upper)
                .is_some_and(Ordering::is_ge),
        }
    }

    /// Checkpoint after `last_record`, the last row handed to the output
    pub fn incomplete_state(&self, last_record: &JsonObject) -> Result<OpaqueStateValue> {
        match &self.kind {
            PartitionKind::UnsplittableSnapshot
            | PartitionKind::UnsplittableSnapshotWithCursor { .. } => Err(Error::partition(
                self.stream.label(),
                format!("{} partitions have no mid-range checkpoint", self.kind_name()),
            )),
            PartitionKind::SplittableSnapshot { .. } => {
                Ok(CheckpointState::snapshot(self.encode_columns(last_record)?))
            }
            PartitionKind::SplittableSnapshotWithCursor { cursor, .. } => {
                Ok(CheckpointState::snapshot_with_cursor(
                    self.encode_columns(last_record)?,
                    &cursor.id,
                    self.required_cursor_upper_bound()?,
                ))
            }
            PartitionKind::CursorIncremental { cursor, .. } => {
                let mut values = self.encode_columns(last_record)?;
                let value = values.remove(&cursor.id).unwrap_or(JsonValue::Null);
                Ok(CheckpointState::cursor_incremental(&cursor.id, value))
            }
        }
    }

    fn required_cursor_upper_bound(&self) -> Result<JsonValue> {
        self.cursor_upper_bound().ok_or_else(|| {
            Error::partition(self.stream.label(), "cursor upper bound was never queried")
        })
    }

    /// Primary key tuple in checkpoint form
    fn encode_key(&self, values: &[JsonValue]) -> Result<JsonObject> {
        self.stream
            .primary_key()
            .iter()
            .zip(values)
            .map(|(field, value)| {
                Ok((field.id.clone(), codec_for(field.field_type).encode(value)?))
            })
            .collect()
    }

    /// Checkpoint column values of a row, in checkpoint form
    fn encode_columns(&self, record: &JsonObject) -> Result<JsonObject> {
        self.checkpoint_columns()
            .into_iter()
            .map(|column| {
                let value = record.get(&column.id).ok_or_else(|| {
                    Error::partition(
                        self.stream.label(),
                        format!("row has no value for checkpoint column '{}'", column.id),
                    )
                })?;
                let encoded = codec_for(column.field_type).encode(value)?;
                Ok((column.id, encoded))
            })
            .collect()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind_name(), self.stream.id())
    }
}
