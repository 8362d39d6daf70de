//! DuckDB SQL rendering
//!
//! Identifiers are always double-quoted and every value travels as a `?`
//! binding, cast back to the column type inside the statement.

use crate::catalog::{Field, FieldType};
use crate::error::Result;
use crate::query::{
    Binding, FromNode, LimitNode, OrderByNode, SelectNode, SelectQuery, SelectQueryGenerator,
    SelectQuerySpec, WhereClauseNode, WhereNode,
};
use crate::types::JsonValue;

/// Renders query specs as DuckDB SQL
#[derive(Debug, Clone, Default)]
pub struct DuckDbQueryGenerator {
    /// Catalog of the attached source database, if any
    catalog: Option<String>,
}

impl DuckDbQueryGenerator {
    /// Generator for tables of the default catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator for tables of an attached catalog
    pub fn with_catalog(catalog: impl Into<String>) -> Self {
        Self {
            catalog: Some(catalog.into()),
        }
    }

    fn table(&self, from: &FromNode) -> String {
        self.catalog
            .as_deref()
            .into_iter()
            .chain(from.namespace())
            .chain(std::iter::once(from.name()))
            .map(quote)
            .collect::<Vec<_>>()
            .join(".")
    }

    fn from_clause(&self, from: &FromNode) -> String {
        match from {
            FromNode::From { .. }
            | FromNode::FromSample {
                sample_rate_inv_pow2: 0,
                ..
            } => format!("FROM {}", self.table(from)),
            FromNode::FromSample {
                sample_rate_inv_pow2,
                ..
            } => {
                let percent = 100.0 / (1u64 << (*sample_rate_inv_pow2).min(63)) as f64;
                format!(
                    "FROM (SELECT * FROM {} USING SAMPLE {percent} PERCENT (bernoulli)) AS sampled",
                    self.table(from)
                )
            }
        }
    }
}

impl SelectQueryGenerator for DuckDbQueryGenerator {
    fn generate(&self, spec: &SelectQuerySpec) -> Result<SelectQuery> {
        let mut bindings = Vec::new();

        let select = match &spec.select {
            SelectNode::SelectColumns(fields) => fields
                .iter()
                .map(|f| quote(&f.id))
                .collect::<Vec<_>>()
                .join(", "),
            SelectNode::SelectColumnMaxValue(field) => {
                let column = quote(&field.id);
                format!("MAX({column}) AS {column}")
            }
        };
        let mut sql = format!("SELECT {select} {}", self.from_clause(&spec.from));

        if let WhereNode::Where(node) = &spec.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&render_where(node, &mut bindings));
        }

        if let OrderByNode::OrderBy(fields) = &spec.order_by {
            let columns = fields
                .iter()
                .map(|f| quote(&f.id))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {columns}"));
        }

        let limit = match (spec.limit, &spec.from) {
            (LimitNode::Limit(n), _) => Some(n),
            (LimitNode::NoLimit, FromNode::FromSample { sample_size, .. }) => {
                Some(*sample_size as u64)
            }
            (LimitNode::NoLimit, FromNode::From { .. }) => None,
        };
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        Ok(SelectQuery {
            sql,
            columns: spec.columns(),
            bindings,
        })
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn render_where(node: &WhereClauseNode, bindings: &mut Vec<Binding>) -> String {
    match node {
        WhereClauseNode::And(nodes) => render_junction(nodes, bindings, " AND "),
        WhereClauseNode::Or(nodes) => render_junction(nodes, bindings, " OR "),
        WhereClauseNode::Equal(f, v) => render_leaf(f, v, "=", bindings),
        WhereClauseNode::Greater(f, v) => render_leaf(f, v, ">", bindings),
        WhereClauseNode::GreaterOrEqual(f, v) => render_leaf(f, v, ">=", bindings),
        WhereClauseNode::Lesser(f, v) => render_leaf(f, v, "<", bindings),
        WhereClauseNode::LesserOrEqual(f, v) => render_leaf(f, v, "<=", bindings),
    }
}

fn render_junction(nodes: &[WhereClauseNode], bindings: &mut Vec<Binding>, op: &str) -> String {
    let parts = nodes
        .iter()
        .map(|n| render_where(n, bindings))
        .collect::<Vec<_>>();
    format!("({})", parts.join(op))
}

fn render_leaf(field: &Field, value: &JsonValue, op: &str, bindings: &mut Vec<Binding>) -> String {
    bindings.push(Binding {
        field_type: field.field_type,
        value: value.clone(),
    });
    format!("{} {op} {}", quote(&field.id), placeholder(field.field_type))
}

/// Placeholder casting the bound text or number back to the column type
fn placeholder(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "CAST(? AS BOOLEAN)",
        FieldType::Integer => "CAST(? AS BIGINT)",
        FieldType::Number => "CAST(? AS DOUBLE)",
        FieldType::Decimal => "CAST(? AS DECIMAL(38, 10))",
        FieldType::String | FieldType::Json => "CAST(? AS VARCHAR)",
        FieldType::Date => "CAST(? AS DATE)",
        FieldType::Time => "CAST(? AS TIME)",
        FieldType::TimestampWithoutTimezone => "CAST(? AS TIMESTAMP)",
        FieldType::TimestampWithTimezone => "CAST(? AS TIMESTAMPTZ)",
        FieldType::Binary => "from_base64(?)",
    }
}
