//! # Store Capabilities
//!
//! The checker and the API never talk to a database driver directly. They
//! hold two query-execution handles, one per store, behind these traits.
//!
//! - `GraphExecutor`: the graph store (nodes and typed relationships)
//! - `RelationalExecutor`: the canonical relational store
//!
//! Both take query text plus named parameters and return rows. Values in a
//! `Params` map are always bound by the driver, never spliced into the text.

pub mod snapshot;

pub use snapshot::{RelationalFact, SnapshotStore, StoreSnapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use truthgraph_core::TruthGraphError;

// =============================================================================
// ERRORS
// =============================================================================

/// Failures reported by a store handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the query.
    #[error("query execution failed: {0}")]
    Execution(String),

    /// The backend cannot answer this query.
    #[error("query not supported by this backend: {0}")]
    Unsupported(String),

    /// A row did not have the expected shape.
    #[error("unexpected row shape: {0}")]
    Decode(String),
}

impl From<StoreError> for TruthGraphError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => TruthGraphError::StoreUnavailable(msg),
            other => TruthGraphError::StoreExecution(other.to_string()),
        }
    }
}

// =============================================================================
// ROWS & PARAMETERS
// =============================================================================

/// Named query parameters.
pub type Params = Map<String, Value>;

/// Build a `Params` map from name/value pairs.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// One result row, keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    #[must_use]
    pub fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// A required column rendered as an identifier string.
    ///
    /// Integer ids (common in relational stores) are accepted and rendered
    /// in decimal so both stores compare on the same key space.
    pub fn id(&self, column: &str) -> Result<String, StoreError> {
        match self.0.get(column) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            Some(other) => Err(StoreError::Decode(format!(
                "column '{}' is not an identifier: {}",
                column, other
            ))),
            None => Err(StoreError::Decode(format!("missing column '{}'", column))),
        }
    }

    /// A required non-negative integer column.
    pub fn count(&self, column: &str) -> Result<u64, StoreError> {
        self.0
            .get(column)
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Decode(format!("column '{}' is not a count", column)))
    }

    /// An optional text column. Null and non-string values read as absent.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// An optional numeric column.
    #[must_use]
    pub fn number(&self, column: &str) -> Option<f64> {
        self.0.get(column).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Row {
    fn from(columns: Map<String, Value>) -> Self {
        Self(columns)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// EXECUTOR TRAITS
// =============================================================================

/// Query execution against the graph store.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn execute(&self, query: &str, params: &Params) -> Result<Vec<Row>, StoreError>;
}

/// Query execution against the relational store.
#[async_trait]
pub trait RelationalExecutor: Send + Sync {
    async fn execute(&self, query: &str, params: &Params) -> Result<Vec<Row>, StoreError>;
}

// =============================================================================
// TESTS
// =============================================================================
