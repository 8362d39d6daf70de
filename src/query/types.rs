//! Abstract select query tree
//!
//! Partitions describe what they read as a `SelectQuerySpec`; a
//! `SelectQueryGenerator` renders it for one SQL dialect.

use crate::catalog::Field;
use crate::types::JsonValue;

/// A complete select statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuerySpec {
    pub select: SelectNode,
    pub from: FromNode,
    pub where_clause: WhereNode,
    pub order_by: OrderByNode,
    pub limit: LimitNode,
}

impl SelectQuerySpec {
    /// Select columns from a source with no predicate, order or limit
    pub fn new(select: SelectNode, from: FromNode) -> Self {
        Self {
            select,
            from,
            where_clause: WhereNode::NoWhere,
            order_by: OrderByNode::NoOrderBy,
            limit: LimitNode::NoLimit,
        }
    }

    #[must_use]
    pub fn with_where(mut self, where_clause: WhereNode) -> Self {
        self.where_clause = where_clause;
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, order_by: OrderByNode) -> Self {
        self.order_by = order_by;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: LimitNode) -> Self {
        self.limit = limit;
        self
    }

    /// Simplify the where clause
    ///
    /// Nested `And`/`Or` nodes of the same kind are flattened, single-child
    /// nodes are replaced by their child and empty nodes are dropped. A where
    /// clause left empty becomes `NoWhere`.
    #[must_use]
    pub fn optimize(mut self) -> Self {
        self.where_clause = match self.where_clause {
            WhereNode::NoWhere => WhereNode::NoWhere,
            WhereNode::Where(node) => match node.optimize() {
                Some(node) => WhereNode::Where(node),
                None => WhereNode::NoWhere,
            },
        };
        self
    }

    /// Columns produced by the query
    pub fn columns(&self) -> Vec<Field> {
        match &self.select {
            SelectNode::SelectColumns(fields) => fields.clone(),
            SelectNode::SelectColumnMaxValue(field) => vec![field.clone()],
        }
    }
}

// ============================================================================
// Select / From
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SelectNode {
    /// Plain column projection
    SelectColumns(Vec<Field>),
    /// `MAX(field)` aliased back to the field name
    SelectColumnMaxValue(Field),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromNode {
    From {
        name: String,
        namespace: Option<String>,
    },
    /// Random sample of roughly one row in `2^sample_rate_inv_pow2`,
    /// capped at `sample_size` rows
    FromSample {
        name: String,
        namespace: Option<String>,
        sample_rate_inv_pow2: u32,
        sample_size: usize,
    },
}

impl FromNode {
    pub fn name(&self) -> &str {
        match self {
            FromNode::From { name, .. } | FromNode::FromSample { name, .. } => name,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            FromNode::From { namespace, .. } | FromNode::FromSample { namespace, .. } => {
                namespace.as_deref()
            }
        }
    }
}

// ============================================================================
// Where
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    NoWhere,
    Where(WhereClauseNode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereClauseNode {
    And(Vec<WhereClauseNode>),
    Or(Vec<WhereClauseNode>),
    Equal(Field, JsonValue),
    Greater(Field, JsonValue),
    GreaterOrEqual(Field, JsonValue),
    Lesser(Field, JsonValue),
    LesserOrEqual(Field, JsonValue),
}

impl WhereClauseNode {
    /// Rows strictly after (or at, when `inclusive`) the key tuple `values`,
    /// in lexicographic order of `columns`
    ///
    /// `OR_i( AND(c_0 = v_0, .., c_{i-1} = v_{i-1}, c_i > v_i) )`
    pub fn lower_bound(columns: &[Field], values: &[JsonValue], inclusive: bool) -> Self {
        let last = columns.len().saturating_sub(1);
        let disjuncts = columns
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (column, value))| {
                let mut conjuncts = equalities(columns, values, i);
                conjuncts.push(if inclusive && i == last {
                    WhereClauseNode::GreaterOrEqual(column.clone(), value.clone())
                } else {
                    WhereClauseNode::Greater(column.clone(), value.clone())
                });
                WhereClauseNode::And(conjuncts)
            })
            .collect();
        WhereClauseNode::Or(disjuncts)
    }

    /// Rows up to and including the key tuple `values`
    ///
    /// `OR_i( AND(c_0 = v_0, .., c_{i-1} = v_{i-1}, c_i < v_i) )` with the
    /// last comparison made inclusive.
    pub fn upper_bound(columns: &[Field], values: &[JsonValue]) -> Self {
        let last = columns.len().saturating_sub(1);
        let disjuncts = columns
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (column, value))| {
                let mut conjuncts = equalities(columns, values, i);
                conjuncts.push(if i == last {
                    WhereClauseNode::LesserOrEqual(column.clone(), value.clone())
                } else {
                    WhereClauseNode::Lesser(column.clone(), value.clone())
                });
                WhereClauseNode::And(conjuncts)
            })
            .collect();
        WhereClauseNode::Or(disjuncts)
    }

    fn optimize(self) -> Option<Self> {
        match self {
            WhereClauseNode::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().filter_map(Self::optimize) {
                    match child {
                        WhereClauseNode::And(nested) => flat.extend(nested),
                        other => flat.push(other),
                    }
                }
                collapse(flat, WhereClauseNode::And)
            }
            WhereClauseNode::Or(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().filter_map(Self::optimize) {
                    match child {
                        WhereClauseNode::Or(nested) => flat.extend(nested),
                        other => flat.push(other),
                    }
                }
                collapse(flat, WhereClauseNode::Or)
            }
            leaf => Some(leaf),
        }
    }
}

fn equalities(columns: &[Field], values: &[JsonValue], upto: usize) -> Vec<WhereClauseNode> {
    columns
        .iter()
        .zip(values)
        .take(upto)
        .map(|(column, value)| WhereClauseNode::Equal(column.clone(), value.clone()))
        .collect()
}

fn collapse(
    mut nodes: Vec<WhereClauseNode>,
    wrap: fn(Vec<WhereClauseNode>) -> WhereClauseNode,
) -> Option<WhereClauseNode> {
    match nodes.len() {
        0 => None,
        1 => nodes.pop(),
        _ => Some(wrap(nodes)),
    }
}

// ============================================================================
// Order By / Limit
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderByNode {
    NoOrderBy,
    OrderBy(Vec<Field>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitNode {
    NoLimit,
    Limit(u64),
}
