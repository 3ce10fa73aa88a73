//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::store::{Row, StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use truthgraph_core::{Correction, HealthSignal, ValidationCode, ValidationResult};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Health derived from the latest consistency report.
    pub consistency: HealthSignal,
}

impl HealthResponse {
    #[must_use]
    pub fn new(consistency: HealthSignal) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            consistency,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ValidationCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// An error response with its status code.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: None,
                parameter: None,
            },
        }
    }

    /// 400 carrying a guard's rejection.
    #[must_use]
    pub fn rejected(result: &ValidationResult) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: result.error().unwrap_or("Invalid input").to_string(),
                code: result.code(),
                parameter: None,
            },
        }
    }

    #[must_use]
    pub fn for_parameter(mut self, name: impl Into<String>) -> Self {
        self.body.parameter = Some(name.into());
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            StoreError::Execution(_) | StoreError::Decode(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::error!(status = status.as_u16(), "Store request failed: {}", e);
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// QUERY REQUEST/RESPONSE
// =============================================================================

/// Free-form graph query request.
///
/// `query` is kept as raw JSON so a missing or non-string query is reported
/// with its own code by the gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Rows returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    pub count: usize,
}

impl QueryResponse {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            count: rows.len(),
            rows,
        }
    }
}

// =============================================================================
// FACT ENDPOINTS
// =============================================================================

/// `GET /api/facts` query string. Kept textual so the guards see exactly
/// what the caller sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactSearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsResponse {
    pub facts: Vec<Row>,
    pub count: usize,
    pub limit: u32,
    pub offset: u64,
    /// Defaults substituted for caller-supplied paging values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<Correction>,
}

/// A single fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactResponse {
    pub fact: Row,
}

/// The history neighbourhood of a fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactGraphResponse {
    pub id: String,
    pub edges: Vec<Row>,
}
