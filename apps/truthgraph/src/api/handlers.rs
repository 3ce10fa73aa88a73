//! # API Endpoint Handlers
//!
//! Every caller-supplied value passes a truthgraph-core guard before it
//! reaches a store. Rejections are 400s carrying the guard's code.

use super::{
    AppState,
    types::{
        ApiError, FactGraphResponse, FactResponse, FactSearchParams, FactsResponse,
        HealthResponse, QueryRequest, QueryResponse,
    },
};
use crate::consistency::LastCheckResults;
use crate::queries::{FACT_BY_ID, FACT_HISTORY, FACT_SEARCH};
use crate::store::{Params, params};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use truthgraph_core::{
    CharsetPolicy, ConsistencyReport, TruthGraphError, ValidationCode, ValidationResult,
    compatibility_redirect, sanitize_parameter, validate_free_text, validate_identifier,
    validate_pagination, validate_query,
    primitives::{DEFAULT_FREE_TEXT_MAX, DEFAULT_FREE_TEXT_MIN, DEFAULT_PAGE_LIMIT},
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Liveness plus the consistency health signal.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let signal = *state.health.borrow();
    Json(HealthResponse::new(signal))
}

// =============================================================================
// CONSISTENCY HANDLERS
// =============================================================================

/// Latest consistency report; never waits on an in-flight run.
pub async fn consistency_handler(State(state): State<AppState>) -> Json<LastCheckResults> {
    Json(state.checker.last_check_results())
}

/// Trigger a consistency run. 409 while another run is in flight.
pub async fn run_consistency_handler(
    State(state): State<AppState>,
) -> Result<Json<ConsistencyReport>, ApiError> {
    match state.checker.run_all_checks().await {
        Ok(report) => Ok(Json(ConsistencyReport::clone(&report))),
        Err(TruthGraphError::CheckInProgress) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "Consistency check already in progress",
        )),
        Err(e) => Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// =============================================================================
// QUERY HANDLER
// =============================================================================

/// Run a caller-authored graph query through the safety gate.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let gate = validate_query(&request.query);
    let Some(query) = gate.sanitized_value() else {
        tracing::warn!(
            event = "query_rejected",
            code = ?gate.code(),
            reason = gate.error().unwrap_or(""),
            "Query rejected by safety gate"
        );
        return Err(ApiError::rejected(&gate));
    };

    let bound = bind_params(request.params)?;
    let rows = state.graph.execute(query, &bound).await?;
    Ok(Json(QueryResponse::new(rows)))
}

/// Validate parameter names and sanitize string values.
///
/// Numbers, booleans, null and arrays of numbers (embeddings) pass through;
/// objects and arrays holding anything else are refused.
fn bind_params(raw: Map<String, Value>) -> Result<Params, ApiError> {
    let mut bound = Params::new();
    for (name, value) in raw {
        let name_check = validate_identifier(name.as_str(), CharsetPolicy::Strict);
        if !name_check.is_valid() {
            return Err(ApiError::rejected(&name_check).for_parameter(name));
        }

        let value = match value {
            Value::String(text) => {
                let result = sanitize_parameter(text.as_str());
                let Some(clean) = result.sanitized_value() else {
                    tracing::warn!(
                        event = "parameter_rejected",
                        parameter = %name,
                        code = ?result.code(),
                        "Query parameter rejected"
                    );
                    return Err(ApiError::rejected(&result).for_parameter(name));
                };
                Value::String(clean.to_string())
            }
            Value::Array(items) if items.iter().all(Value::is_number) => Value::Array(items),
            Value::Array(_) | Value::Object(_) => {
                let result = ValidationResult::rejected(
                    ValidationCode::InvalidType,
                    "Parameter must be a string, number, boolean, null or numeric array",
                );
                return Err(ApiError::rejected(&result).for_parameter(name));
            }
            scalar => scalar,
        };
        bound.insert(name, value);
    }
    Ok(bound)
}

// =============================================================================
// FACT HANDLERS
// =============================================================================

/// Paged full-text search over fact statements.
pub async fn facts_search_handler(
    State(state): State<AppState>,
    Query(search): Query<FactSearchParams>,
) -> Result<Json<FactsResponse>, ApiError> {
    let text_check = validate_free_text(
        search.q.as_deref(),
        DEFAULT_FREE_TEXT_MIN,
        DEFAULT_FREE_TEXT_MAX,
    );
    let Some(text) = text_check.sanitized_value() else {
        tracing::warn!(
            event = "search_rejected",
            code = ?text_check.code(),
            "Search text rejected"
        );
        return Err(ApiError::rejected(&text_check).for_parameter("q"));
    };

    let term_check = sanitize_parameter(text);
    let Some(term) = term_check.sanitized_value().map(str::to_string) else {
        return Err(ApiError::rejected(&term_check).for_parameter("q"));
    };

    let page = validate_pagination(search.limit.as_deref(), search.offset.as_deref());
    if !page.is_valid() {
        tracing::warn!(event = "pagination_rejected", code = ?page.code(), "Pagination rejected");
        return Err(ApiError::rejected(&page));
    }
    for correction in page.corrections() {
        tracing::info!(
            event = "pagination_corrected",
            field = %correction.field,
            from = %correction.from,
            to = %correction.to,
            "Pagination value defaulted"
        );
    }
    let limit = page.normalized_limit().unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = page.normalized_offset().unwrap_or(0);

    let bound = params([
        ("q", json!(term)),
        ("limit", json!(limit)),
        ("offset", json!(offset)),
    ]);
    let facts = state.graph.execute(FACT_SEARCH, &bound).await?;

    Ok(Json(FactsResponse {
        count: facts.len(),
        facts,
        limit,
        offset,
        corrections: page.corrections().to_vec(),
    }))
}

fn require_identifier(id: &str) -> Result<String, ApiError> {
    let result = validate_identifier(id, CharsetPolicy::Strict);
    match result.sanitized_value() {
        Some(id) => Ok(id.to_string()),
        None => Err(ApiError::rejected(&result).for_parameter("id")),
    }
}

/// One fact by id.
pub async fn fact_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FactResponse>, ApiError> {
    let id = require_identifier(&id)?;
    let rows = state
        .graph
        .execute(FACT_BY_ID, &params([("id", json!(id))]))
        .await?;

    match rows.into_iter().next() {
        Some(fact) => Ok(Json(FactResponse { fact })),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, format!("Fact {} not found", id))),
    }
}

/// Evolution, provenance and contradiction edges around a fact.
pub async fn fact_graph_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FactGraphResponse>, ApiError> {
    let id = require_identifier(&id)?;
    let edges = state
        .graph
        .execute(FACT_HISTORY, &params([("id", json!(id))]))
        .await?;
    Ok(Json(FactGraphResponse { id, edges }))
}

// =============================================================================
// COMPATIBILITY REDIRECTS
// =============================================================================

/// `/fact/{id}` → `/api/facts/{id}`
pub async fn legacy_fact_redirect(Path(id): Path<String>) -> Response {
    legacy_redirect("/api/facts", &id)
}

/// `/fact_graph/{id}` → `/api/fact_graph/{id}`
pub async fn legacy_fact_graph_redirect(Path(id): Path<String>) -> Response {
    legacy_redirect("/api/fact_graph", &id)
}

fn legacy_redirect(target: &str, id: &str) -> Response {
    let validator = |_: &str, value: &str| validate_identifier(value, CharsetPolicy::Strict);

    match compatibility_redirect(target, &[("id", id)], validator, None) {
        Ok(instruction) => {
            for correction in &instruction.corrections {
                tracing::info!(
                    event = "redirect_status_corrected",
                    from = %correction.from,
                    to = %correction.to,
                    "Redirect status defaulted"
                );
            }
            let status =
                StatusCode::from_u16(instruction.status).unwrap_or(StatusCode::MOVED_PERMANENTLY);
            (status, [(header::LOCATION, instruction.location.to_string())]).into_response()
        }
        Err(rejection) => {
            tracing::warn!(
                event = "redirect_rejected",
                code = %rejection.code,
                parameter = ?rejection.parameter,
                "Compatibility redirect rejected"
            );
            let status = StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(rejection)).into_response()
        }
    }
}
