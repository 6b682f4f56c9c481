//! Extender HTTP Routes
//!
//! Exposes every registered plugin at
//! `/{prefix}/predicates/{name}` or `/{prefix}/priorities/{name}`, plus
//! version, health and readiness probes.

use super::dispatcher::Extender;
use super::types::{ExtenderArgs, ExtenderFilterResult};
use crate::error::Error;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// =============================================================================
// Router
// =============================================================================

/// Extender router builder
pub struct ExtenderRouter {
    extender: Arc<Extender>,
    prefix: String,
}

impl ExtenderRouter {
    /// Create a router serving plugins under `prefix`
    pub fn new(extender: Arc<Extender>, prefix: impl Into<String>) -> Self {
        Self {
            extender,
            prefix: prefix.into(),
        }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let base = match self.prefix.trim_matches('/') {
            "" => String::new(),
            prefix => format!("/{}", prefix),
        };
        let state = AppState {
            extender: self.extender,
        };

        Router::new()
            .route(&format!("{}/predicates/:name", base), post(filter))
            .route(&format!("{}/priorities/:name", base), post(prioritize))
            .route("/version", get(version))
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    extender: Arc<Extender>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Filter callback
async fn filter(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    if !state.extender.ready() {
        return error_response(&Error::NotReady);
    }

    let args: ExtenderArgs = match serde_json::from_slice(&body) {
        Ok(args) => args,
        Err(e) => {
            warn!(plugin = %name, error = %e, "Failed to decode filter request");
            return (StatusCode::OK, Json(ExtenderFilterResult::from_error(e.to_string())))
                .into_response();
        }
    };

    match state.extender.filter(&name, args) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e @ Error::PluginNotFound { .. }) => error_response(&e),
        Err(e) => {
            error!(plugin = %name, error = %e, "Filter failed");
            (StatusCode::OK, Json(ExtenderFilterResult::from_error(e.to_string()))).into_response()
        }
    }
}

/// Prioritize callback
async fn prioritize(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    if !state.extender.ready() {
        return error_response(&Error::NotReady);
    }

    let args: ExtenderArgs = match serde_json::from_slice(&body) {
        Ok(args) => args,
        Err(e) => {
            warn!(plugin = %name, error = %e, "Failed to decode prioritize request");
            return error_response(&Error::ApiValidation(e.to_string()));
        }
    };

    match state.extender.prioritize(&name, args).await {
        Ok(scores) => (StatusCode::OK, Json(scores)).into_response(),
        Err(e) => {
            if !matches!(e, Error::PluginNotFound { .. }) {
                error!(plugin = %name, error = %e, "Prioritize failed");
            }
            error_response(&e)
        }
    }
}

async fn version() -> impl IntoResponse {
    crate::VERSION
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.extender.ready() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Map an error to its status code and JSON body
fn error_response(err: &Error) -> Response {
    let (status, kind) = match err {
        Error::PluginNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        Error::NotReady | Error::CacheNotSynced { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
        }
        Error::ApiValidation(_) | Error::JsonParse(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        Error::Scoring { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "scoring_failed"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    let details = match err {
        Error::Scoring { partial, .. } => serde_json::to_string(partial).ok(),
        _ => None,
    };

    (
        status,
        Json(ApiErrorResponse {
            error: kind.to_string(),
            message: err.to_string(),
            details,
        }),
    )
        .into_response()
}
