//! Row source seams
//!
//! The core never talks to a driver directly. It hands a `SelectQuerySpec`
//! to a `SelectQuerier` and consumes the rows it streams back.

use super::types::SelectQuerySpec;
use crate::catalog::{Field, FieldType};
use crate::error::Result;
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Driver hints for one query execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryParameters {
    /// Rows are consumed one at a time and may share buffers
    pub reuse_result_object: bool,
    /// Rows fetched per round trip, driver default when `None`
    pub fetch_size: Option<usize>,
}

/// Rows of one query, each keyed by column name
pub type RowStream = BoxStream<'static, Result<JsonObject>>;

/// Executes abstract select queries
#[async_trait]
pub trait SelectQuerier: Send + Sync {
    async fn execute_query(
        &self,
        spec: &SelectQuerySpec,
        parameters: QueryParameters,
    ) -> Result<RowStream>;
}

/// A rendered statement with positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub sql: String,
    /// Output columns, in select order
    pub columns: Vec<Field>,
    pub bindings: Vec<Binding>,
}

/// One `?` placeholder value
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub field_type: FieldType,
    pub value: JsonValue,
}

/// Renders query specs for one SQL dialect
pub trait SelectQueryGenerator: Send + Sync {
    fn generate(&self, spec: &SelectQuerySpec) -> Result<SelectQuery>;
}
