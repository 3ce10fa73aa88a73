//! # TruthGraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness plus consistency health signal
//! - `GET /api/consistency` - Latest consistency report
//! - `POST /api/consistency/run` - Trigger a consistency run (409 if one is running)
//! - `POST /api/query` - Run a gated read-only graph query
//! - `GET /api/facts?q=&limit=&offset=` - Paged full-text fact search
//! - `GET /api/facts/{id}` - One fact
//! - `GET /api/fact_graph/{id}` - Fact history neighbourhood
//! - `GET /fact/{id}`, `GET /fact_graph/{id}` - Compatibility redirects
//!
//! ## Security Configuration
//!
//! Taken from [`AppConfig`](crate::config::AppConfig):
//! - `cors_origins`: comma-separated allowed origins, or "*" for all (default: localhost only)
//! - `rate_limit`: requests per second (default: 100, 0 to disable)
//! - `api_key`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ApiError, ErrorResponse, FactGraphResponse, FactResponse, FactSearchParams, FactsResponse,
    HealthResponse, QueryRequest, QueryResponse,
};

use crate::config::AppConfig;
use crate::consistency::ConsistencyChecker;
use crate::store::GraphExecutor;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use truthgraph_core::{HealthSignal, TruthGraphError};

/// Request body ceiling (64 KB). Queries are capped at 10 000 characters.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<ConsistencyChecker>,
    pub graph: Arc<dyn GraphExecutor>,
    pub health: watch::Receiver<HealthSignal>,
}

impl AppState {
    #[must_use]
    pub fn new(checker: Arc<ConsistencyChecker>, graph: Arc<dyn GraphExecutor>) -> Self {
        let health = checker.subscribe_health();
        Self {
            checker,
            graph,
            health,
        }
    }
}

/// The HTTP-facing subset of the configuration.
#[derive(Clone, Default)]
pub struct SecurityConfig {
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
    pub api_key: Option<String>,
}

impl From<&AppConfig> for SecurityConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cors_origins: config.cors_origins.clone(),
            rate_limit: config.rate_limit,
            api_key: config.api_key.clone(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `"*"`: allows all origins (development only)
/// - unset: localhost only
/// - otherwise: the comma-separated list of origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against DoS (if enabled)
/// 5. Authentication - validates API key (if configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let cors = build_cors_layer(security.cors_origins.as_deref());

    let rate_limiter = if security.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
        Some(create_rate_limiter(security.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = security.api_key.as_deref().filter(|k| !k.is_empty());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set TRUTHGRAPH_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/consistency", get(handlers::consistency_handler))
        .route("/api/consistency/run", post(handlers::run_consistency_handler))
        .route("/api/query", post(handlers::query_handler))
        .route("/api/facts", get(handlers::facts_search_handler))
        .route("/api/facts/{id}", get(handlers::fact_handler))
        .route("/api/fact_graph/{id}", get(handlers::fact_graph_handler))
        .route("/fact/{id}", get(handlers::legacy_fact_redirect))
        .route("/fact_graph/{id}", get(handlers::legacy_fact_graph_redirect));

    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            ApiKey::new(key),
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn run_server<F>(
    addr: &str,
    state: AppState,
    security: &SecurityConfig,
    shutdown: F,
) -> Result<(), TruthGraphError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TruthGraphError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("TruthGraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TruthGraphError::IoError(format!("Server error: {}", e)))
}
