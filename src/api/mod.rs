//! REST API endpoints.
//!
//! Axum-based HTTP API for reading archetype analyses and driving
//! cache invalidation and incremental updates.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::cache::CacheError;
use crate::sync::SyncError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InsufficientSample(_) => ApiError::NotFound(e.to_string()),
            CacheError::RecoverableFetch { .. } => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::AlreadyRunning => ApiError::Conflict(e.to_string()),
            SyncError::Fetch(_) => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the application router, allowing any CORS origin.
pub fn build_router(state: AppState) -> Router {
    build_router_with_origin(state, "*")
}

/// Build the application router with a CORS origin from configuration.
pub fn build_router_with_origin(state: AppState, origin: &str) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/archetypes", get(routes::archetypes::list_ranking))
        .route(
            "/api/archetypes/:archetype/:format",
            get(routes::archetypes::get_analysis),
        )
        .route(
            "/api/archetypes/:archetype/:format/cards",
            get(routes::archetypes::get_cards),
        )
        .route(
            "/api/archetypes/:archetype/:format/invalidate",
            post(routes::archetypes::invalidate),
        )
        .route("/api/cache/stats", get(routes::archetypes::cache_stats))
        .route("/api/refresh", post(routes::refresh::refresh))
        .route("/api/refresh/status", get(routes::refresh::status))
        .with_state(state)
        .layer(cors_layer(origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any", origin);
            layer.allow_origin(Any)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::ArchetypeKey;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_cache_error_status() {
        let key = ArchetypeKey::new("gardevoir", "A2");
        assert_eq!(
            status_of(CacheError::InsufficientSample(key.clone()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                CacheError::RecoverableFetch {
                    key,
                    source: FetchError::Parse("bad".to_string()),
                }
                .into()
            ),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_configured_cors_origin() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::util::ServiceExt;

        let app = routes::testing::setup();
        let router = build_router_with_origin(app.state.clone(), "http://localhost:5173");
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
    }

    #[test]
    fn test_sync_error_status() {
        assert_eq!(
            status_of(SyncError::AlreadyRunning.into()),
            StatusCode::CONFLICT
        );
    }
}
