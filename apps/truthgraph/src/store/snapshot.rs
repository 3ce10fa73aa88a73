//! # Snapshot Store
//!
//! A read-only, in-memory backend loaded from a JSON export of both stores.
//! It implements both executor traits so the checker and the API can run
//! against an offline snapshot (`truthgraph check --snapshot dump.json`).
//!
//! The snapshot answers the fixed queries in [`crate::queries`] and nothing
//! else: free-form query text is `StoreError::Unsupported`.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "graph": {
//!     "facts": [{"id": "f1", "text": "...", "confidence": 0.9}],
//!     "relationships": [{"from": "a1", "to": "f1", "type": "ASSERTED"}]
//!   },
//!   "relational": {
//!     "facts": [{
//!       "id": "f1", "subject": "...", "confidence": 0.9,
//!       "is_original": true, "checked_at": "2024-05-01T12:00:00Z"
//!     }]
//!   }
//! }
//! ```
//!
//! A relational fact without `is_original` is not an original, and one
//! without `checked_at` has not been provenance-checked. Neither is mirrored.

use super::{GraphExecutor, Params, RelationalExecutor, Row, StoreError};
use crate::queries::{
    FACT_BY_ID, FACT_HISTORY, FACT_SEARCH, GRAPH_FACT_IDS, GRAPH_FACT_INTEGRITY,
    GRAPH_RELATIONSHIP_COUNTS, HISTORY_RELATIONSHIP_TYPES, RELATIONAL_FACT_IDS,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use std::path::Path;
use truthgraph_core::TruthGraphError;

/// Maximum snapshot file size (100 MB).
///
/// The whole snapshot is held in memory.
const MAX_SNAPSHOT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// History rows returned per fact, matching the `LIMIT` in `FACT_HISTORY`.
const MAX_HISTORY_ROWS: usize = 100;

// =============================================================================
// SNAPSHOT MODEL
// =============================================================================

/// A fact node as exported from the graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphFact {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A typed relationship between two graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

/// A row of the relational `extracted_facts` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalFact {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_original: bool,
    /// When provenance checking finished; `None` while pending.
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
}

impl RelationalFact {
    /// Whether the sync mirrors this row into the graph.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.is_original && self.checked_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub facts: Vec<GraphFact>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationalSnapshot {
    #[serde(default)]
    pub facts: Vec<RelationalFact>,
}

/// Both stores, as exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub graph: GraphSnapshot,
    #[serde(default)]
    pub relational: RelationalSnapshot,
}

// =============================================================================
// SNAPSHOT STORE
// =============================================================================

/// Executor over an in-memory [`StoreSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: StoreSnapshot,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file.
    ///
    /// The path is canonicalized and must be a regular file no larger than
    /// 100 MB.
    pub fn load(path: &Path) -> Result<Self, TruthGraphError> {
        let canonical = path.canonicalize().map_err(|e| {
            TruthGraphError::IoError(format!("Invalid snapshot path '{}': {}", path.display(), e))
        })?;
        if !canonical.is_file() {
            return Err(TruthGraphError::IoError(format!(
                "Snapshot path '{}' is not a regular file",
                path.display()
            )));
        }

        let metadata = std::fs::metadata(&canonical)
            .map_err(|e| TruthGraphError::IoError(format!("Cannot read file metadata: {}", e)))?;
        if metadata.len() > MAX_SNAPSHOT_FILE_SIZE {
            return Err(TruthGraphError::SerializationError(format!(
                "Snapshot size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SNAPSHOT_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(&canonical)
            .map_err(|e| TruthGraphError::IoError(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .map_err(|e| TruthGraphError::SerializationError(format!("Invalid snapshot: {}", e)))?;

        tracing::info!(
            path = %canonical.display(),
            graph_facts = snapshot.graph.facts.len(),
            relationships = snapshot.graph.relationships.len(),
            relational_facts = snapshot.relational.facts.len(),
            "Snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    #[must_use]
    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    fn graph_fact_ids(&self) -> Vec<Row> {
        self.snapshot
            .graph
            .facts
            .iter()
            .map(|f| row([("id", json!(f.id))]))
            .collect()
    }

    fn relationship_counts(&self) -> Vec<Row> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for rel in &self.snapshot.graph.relationships {
            *counts.entry(rel.rel_type.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(rel_type, count)| row([("rel_type", json!(rel_type)), ("count", json!(count))]))
            .collect()
    }

    fn integrity_rows(&self) -> Vec<Row> {
        self.snapshot
            .graph
            .facts
            .iter()
            .map(|f| {
                row([
                    ("id", json!(f.id)),
                    ("confidence", json!(f.confidence)),
                    ("text", json!(f.text)),
                ])
            })
            .collect()
    }

    fn fact_by_id(&self, params: &Params) -> Result<Vec<Row>, StoreError> {
        let id = text_param(params, "id")?;
        Ok(self
            .snapshot
            .graph
            .facts
            .iter()
            .filter(|f| f.id == id)
            .take(1)
            .map(fact_row)
            .collect())
    }

    fn search(&self, params: &Params) -> Result<Vec<Row>, StoreError> {
        let needle = text_param(params, "q")?.to_lowercase();
        let offset = count_param(params, "offset")?;
        let limit = count_param(params, "limit")?;
        Ok(self
            .snapshot
            .graph
            .facts
            .iter()
            .filter(|f| {
                f.text
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
            .skip(offset)
            .take(limit)
            .map(|f| {
                row([
                    ("id", json!(f.id)),
                    ("text", json!(f.text)),
                    ("confidence", json!(f.confidence)),
                ])
            })
            .collect())
    }

    fn history(&self, params: &Params) -> Result<Vec<Row>, StoreError> {
        let id = text_param(params, "id")?;
        Ok(self
            .snapshot
            .graph
            .relationships
            .iter()
            .filter(|r| r.from == id || r.to == id)
            .filter(|r| HISTORY_RELATIONSHIP_TYPES.contains(&r.rel_type.as_str()))
            .take(MAX_HISTORY_ROWS)
            .map(|r| {
                row([
                    ("from", json!(r.from)),
                    ("to", json!(r.to)),
                    ("rel_type", json!(r.rel_type)),
                ])
            })
            .collect())
    }
}

fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn fact_row(fact: &GraphFact) -> Row {
    row([
        ("id", json!(fact.id)),
        ("text", json!(fact.text)),
        ("subject", json!(fact.subject)),
        ("predicate", json!(fact.predicate)),
        ("object", json!(fact.object)),
        ("confidence", json!(fact.confidence)),
    ])
}

fn text_param<'a>(params: &'a Params, name: &str) -> Result<&'a str, StoreError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Execution(format!("missing text parameter ${}", name)))
}

fn count_param(params: &Params, name: &str) -> Result<usize, StoreError> {
    params
        .get(name)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::Execution(format!("missing integer parameter ${}", name)))
}

fn unsupported(query: &str) -> StoreError {
    let preview: String = query.chars().take(60).collect();
    StoreError::Unsupported(format!("snapshot cannot run '{}'", preview))
}

#[async_trait]
impl GraphExecutor for SnapshotStore {
    async fn execute(&self, query: &str, params: &Params) -> Result<Vec<Row>, StoreError> {
        match query {
            GRAPH_FACT_IDS => Ok(self.graph_fact_ids()),
            GRAPH_RELATIONSHIP_COUNTS => Ok(self.relationship_counts()),
            GRAPH_FACT_INTEGRITY => Ok(self.integrity_rows()),
            FACT_BY_ID => self.fact_by_id(params),
            FACT_SEARCH => self.search(params),
            FACT_HISTORY => self.history(params),
            other => Err(unsupported(other)),
        }
    }
}

#[async_trait]
impl RelationalExecutor for SnapshotStore {
    async fn execute(&self, query: &str, _params: &Params) -> Result<Vec<Row>, StoreError> {
        match query {
            RELATIONAL_FACT_IDS => Ok(self
                .snapshot
                .relational
                .facts
                .iter()
                .filter(|f| f.is_mirrored())
                .map(|f| row([("id", json!(f.id))]))
                .collect()),
            other => Err(unsupported(other)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
