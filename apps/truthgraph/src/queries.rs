//! # Fixed Queries
//!
//! Every query the service issues on its own behalf. These are constants;
//! caller input only ever reaches them as bound `$parameters`.
//!
//! Graph schema: `(:Fact {id, text, subject, predicate, object, confidence})`
//! with `ASSERTED`, `EVOLVES_TO`, `CONTRADICTS`, `SIMILAR_TO` and `MENTIONS`
//! relationships. Relational schema: `extracted_facts (id, subject,
//! predicate, object, confidence, is_original, checked_at)`.

// =============================================================================
// CONSISTENCY CHECKS
// =============================================================================

/// Every fact id in the graph store. Column: `id`.
pub const GRAPH_FACT_IDS: &str = "MATCH (f:Fact) RETURN f.id AS id";

/// Fact ids the relational store expects to see in the graph. Column: `id`.
///
/// Only original, provenance-checked facts are synced into the graph.
/// Copies and facts still awaiting a check never get a node, so comparing
/// against the whole table would report each of them as missing.
pub const RELATIONAL_FACT_IDS: &str =
    "SELECT id FROM extracted_facts WHERE is_original = TRUE AND checked_at IS NOT NULL";

/// Edge count per relationship type. Columns: `rel_type`, `count`.
pub const GRAPH_RELATIONSHIP_COUNTS: &str =
    "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(r) AS count";

/// Fields inspected by the integrity audit. Columns: `id`, `confidence`, `text`.
pub const GRAPH_FACT_INTEGRITY: &str =
    "MATCH (f:Fact) RETURN f.id AS id, f.confidence AS confidence, f.text AS text";

// =============================================================================
// API READS
// =============================================================================

/// One fact by id. Parameter: `$id`.
pub const FACT_BY_ID: &str = "MATCH (f:Fact {id: $id}) \
     RETURN f.id AS id, f.text AS text, f.subject AS subject, f.predicate AS predicate, \
     f.object AS object, f.confidence AS confidence LIMIT 1";

/// Full-text fact search. Parameters: `$q`, `$offset`, `$limit`.
pub const FACT_SEARCH: &str = "CALL db.index.fulltext.queryNodes('fact_statement_fulltext', $q) \
     YIELD node, score \
     RETURN node.id AS id, node.text AS text, node.confidence AS confidence, score \
     ORDER BY score DESC SKIP $offset LIMIT $limit";

/// The evolution, provenance and contradiction neighbourhood of a fact.
/// Parameter: `$id`. Columns: `from`, `to`, `rel_type`.
pub const FACT_HISTORY: &str = "MATCH (f:Fact {id: $id})-[r:EVOLVES_TO|ASSERTED|CONTRADICTS]-(n) \
     RETURN startNode(r).id AS from, endNode(r).id AS to, type(r) AS rel_type LIMIT 100";

/// Relationship types traversed by `FACT_HISTORY`.
pub const HISTORY_RELATIONSHIP_TYPES: [&str; 3] = ["EVOLVES_TO", "ASSERTED", "CONTRADICTS"];

#[cfg(test)]
mod tests {
    use super::*;
    use truthgraph_core::validate_query;

    #[test]
    fn api_reads_pass_the_gate() {
        assert!(validate_query(FACT_BY_ID).is_valid());
        assert!(validate_query(FACT_HISTORY).is_valid());
    }

    #[test]
    fn relational_ids_select_the_mirrored_subset() {
        assert!(RELATIONAL_FACT_IDS.contains("is_original = TRUE"));
        assert!(RELATIONAL_FACT_IDS.contains("checked_at IS NOT NULL"));
    }

    #[test]
    fn search_is_an_index_call() {
        assert!(truthgraph_core::is_index_call(FACT_SEARCH));
    }
}
