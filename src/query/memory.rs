//! In-memory row source
//!
//! Evaluates `SelectQuerySpec`s over rows held in memory, comparing values
//! with the checkpoint codecs. Sampling keeps every `2^k`-th row so results
//! are deterministic.

use super::querier::{QueryParameters, RowStream, SelectQuerier};
use super::types::{
    FromNode, LimitNode, OrderByNode, SelectNode, SelectQuerySpec, WhereClauseNode, WhereNode,
};
use crate::catalog::{Field, StreamIdentifier};
use crate::codec::codec_for;
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fails the first plain read whose result holds `column = value`
#[derive(Debug)]
struct RowFailure {
    column: String,
    value: JsonValue,
    message: String,
}

/// `SelectQuerier` over in-memory tables
#[derive(Debug, Default)]
pub struct InMemorySelectQuerier {
    tables: Mutex<HashMap<StreamIdentifier, Vec<JsonObject>>>,
    executed: Mutex<Vec<(SelectQuerySpec, QueryParameters)>>,
    failures: Mutex<Vec<String>>,
    row_failures: Mutex<Vec<RowFailure>>,
    row_delay: Option<Duration>,
}

impl InMemorySelectQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before yielding each row
    #[must_use]
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }

    /// Replace the rows of a table
    pub fn set_rows(&self, table: StreamIdentifier, rows: Vec<JsonObject>) {
        lock(&self.tables).insert(table, rows);
    }

    /// Append rows to a table
    pub fn insert_rows(
        &self,
        table: &StreamIdentifier,
        rows: impl IntoIterator<Item = JsonObject>,
    ) {
        lock(&self.tables).entry(table.clone()).or_default().extend(rows);
    }

    /// Make the next query fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        lock(&self.failures).push(message.into());
    }

    /// Make the next non-sampling query returning a row with `column = value`
    /// fail with `message`
    pub fn fail_reading(
        &self,
        column: impl Into<String>,
        value: JsonValue,
        message: impl Into<String>,
    ) {
        lock(&self.row_failures).push(RowFailure {
            column: column.into(),
            value,
            message: message.into(),
        });
    }

    /// Queries executed so far, oldest first
    pub fn executed(&self) -> Vec<(SelectQuerySpec, QueryParameters)> {
        lock(&self.executed).clone()
    }

    fn evaluate(&self, spec: &SelectQuerySpec) -> Result<Vec<JsonObject>> {
        let table = StreamIdentifier {
            namespace: spec.from.namespace().map(str::to_string),
            name: spec.from.name().to_string(),
        };
        let tables = lock(&self.tables);
        let rows = tables
            .get(&table)
            .ok_or_else(|| Error::query(format!("Table {table} does not exist")))?;

        let (stride, sample_size) = match &spec.from {
            FromNode::From { .. } => (1, None),
            FromNode::FromSample {
                sample_rate_inv_pow2,
                sample_size,
                ..
            } => (1usize << (*sample_rate_inv_pow2).min(32), Some(*sample_size)),
        };

        let mut selected = Vec::new();
        for row in rows.iter().step_by(stride) {
            let keep = match &spec.where_clause {
                WhereNode::NoWhere => true,
                WhereNode::Where(node) => matches(node, row)?,
            };
            if keep {
                selected.push(row.clone());
            }
        }

        if let OrderByNode::OrderBy(fields) = &spec.order_by {
            selected.sort_by(|a, b| compare_rows(fields, a, b));
        }

        if let SelectNode::SelectColumnMaxValue(field) = &spec.select {
            let max = selected
                .iter()
                .filter_map(|row| row.get(&field.id))
                .filter(|value| !value.is_null())
                .try_fold(None::<JsonValue>, |max, value| {
                    let value = codec_for(field.field_type).encode(value)?;
                    Ok::<_, Error>(match max {
                        Some(current) if compare(field, &current, &value) != Some(Ordering::Less) => {
                            Some(current)
                        }
                        _ => Some(value),
                    })
                })?
                .unwrap_or(JsonValue::Null);
            let mut row = JsonObject::new();
            row.insert(field.id.clone(), max);
            return Ok(vec![row]);
        }

        let mut cap = match spec.limit {
            LimitNode::NoLimit => usize::MAX,
            LimitNode::Limit(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        if let Some(sample_size) = sample_size {
            cap = cap.min(sample_size);
        }
        selected.truncate(cap);

        let columns = spec.columns();
        Ok(selected
            .into_iter()
            .map(|row| project(&columns, row))
            .collect())
    }
}

#[async_trait]
impl SelectQuerier for InMemorySelectQuerier {
    async fn execute_query(
        &self,
        spec: &SelectQuerySpec,
        parameters: QueryParameters,
    ) -> Result<RowStream> {
        lock(&self.executed).push((spec.clone(), parameters));
        if let Some(message) = lock(&self.failures).pop() {
            return Err(Error::query(message));
        }

        let rows = self.evaluate(spec)?;
        if matches!(spec.from, FromNode::From { .. }) {
            let mut row_failures = lock(&self.row_failures);
            let hit = row_failures.iter().position(|failure| {
                rows.iter()
                    .any(|row| row.get(&failure.column) == Some(&failure.value))
            });
            if let Some(index) = hit {
                return Err(Error::query(row_failures.remove(index).message));
            }
        }
        let rows = stream::iter(rows.into_iter().map(Ok::<_, Error>));
        Ok(match self.row_delay {
            Some(delay) => rows
                .then(move |row| async move {
                    tokio::time::sleep(delay).await;
                    row
                })
                .boxed(),
            None => rows.boxed(),
        })
    }
}

fn project(columns: &[Field], mut row: JsonObject) -> JsonObject {
    columns
        .iter()
        .map(|field| {
            let value = row.remove(&field.id).unwrap_or(JsonValue::Null);
            (field.id.clone(), value)
        })
        .collect()
}

fn compare(field: &Field, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    codec_for(field.field_type).compare(a, b)
}

/// Nulls sort first
fn compare_rows(fields: &[Field], a: &JsonObject, b: &JsonObject) -> Ordering {
    let codec_value = |field: &Field, row: &JsonObject| {
        row.get(&field.id)
            .and_then(|value| codec_for(field.field_type).encode(value).ok())
            .unwrap_or(JsonValue::Null)
    };
    fields
        .iter()
        .map(|field| {
            let (a, b) = (codec_value(field, a), codec_value(field, b));
            match (a.is_null(), b.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare(field, &a, &b).unwrap_or(Ordering::Equal),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// SQL semantics: a comparison with NULL is never true
fn matches(node: &WhereClauseNode, row: &JsonObject) -> Result<bool> {
    let test = |field: &Field, value: &JsonValue, accept: fn(Ordering) -> bool| -> Result<bool> {
        let Some(actual) = row.get(&field.id).filter(|v| !v.is_null()) else {
            return Ok(false);
        };
        if value.is_null() {
            return Ok(false);
        }
        let actual = codec_for(field.field_type).encode(actual)?;
        Ok(compare(field, &actual, value).is_some_and(accept))
    };

    match node {
        WhereClauseNode::And(children) => {
            for child in children {
                if !matches(child, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        WhereClauseNode::Or(children) => {
            for child in children {
                if matches(child, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        WhereClauseNode::Equal(field, value) => test(field, value, Ordering::is_eq),
        WhereClauseNode::Greater(field, value) => test(field, value, Ordering::is_gt),
        WhereClauseNode::GreaterOrEqual(field, value) => test(field, value, Ordering::is_ge),
        WhereClauseNode::Lesser(field, value) => test(field, value, Ordering::is_lt),
        WhereClauseNode::LesserOrEqual(field, value) => test(field, value, Ordering::is_le),
    }
}
