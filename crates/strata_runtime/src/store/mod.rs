//! Data-store capability consumed by the relation fetchers and the
//! model-backed directives.
//!
//! The runtime never talks to a database directly: it builds [`Statement`]s
//! and hands them to a [`DataStore`]. [`MemoryStore`] is the table-backed
//! implementation used for tests and embedding.

mod memory;
mod model;
mod query;

pub use memory::MemoryStore;
pub use model::{basename, Model, ModelCatalog, Relation, RelationKind};
pub(crate) use model::tag_rows;
pub use query::{
    pivot_column, AggregateFunction, Condition, Constraint, Direction, Link, Operator,
    RelationAggregate, Select, Statement,
};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A fetched row, as a JSON object.
pub type Row = Map<String, Value>;

/// Attribute every fetched row is tagged with, naming its model.
pub const MODEL_KEY: &str = "__model";

/// Errors reported by a data store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown table `{0}`.")]
    UnknownTable(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Data store failure: {0}")]
    Backend(String),
}

/// Executes statements against the underlying data.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Executes a statement and returns the resulting rows.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
}

/// Normalises a key value so `1` and `"1"` identify the same row.
#[must_use]
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
