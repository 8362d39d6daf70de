//! Abstract query model
//!
//! # Overview
//!
//! - `SelectQuerySpec` - Select / from / where / order by / limit tree
//! - `WhereClauseNode::lower_bound` / `upper_bound` - Lexicographic key range predicates
//! - `SelectQuerier` - Executes a spec and streams rows back
//! - `SelectQueryGenerator` - Renders a spec to SQL with bindings
//! - `InMemorySelectQuerier` - Evaluates specs over rows held in memory

mod memory;
mod querier;
mod types;

pub use memory::InMemorySelectQuerier;
pub use querier::{
    Binding, QueryParameters, RowStream, SelectQuerier, SelectQuery, SelectQueryGenerator,
};
pub use types::{
    FromNode, LimitNode, OrderByNode, SelectNode, SelectQuerySpec, WhereClauseNode, WhereNode,
};
