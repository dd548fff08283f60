//! Axum router and request handlers for the repository gateway.
//!
//! Routes:
//! - `GET /api/repos`  - Repository payload, stale-while-revalidate
//! - `GET /api/health` - Liveness probe
//!
//! Every response, including preflights and 404s, carries the same
//! permissive CORS headers.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::error::ShelfError;

use super::swr::{CacheStatus, Gateway, Served};

pub const CACHE_STATUS_HEADER: &str = "x-cache";

const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET,OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type,Authorization"),
    (header::ACCESS_CONTROL_MAX_AGE, "86400"),
];

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the [`Router`] with all routes, the CORS layers, and request tracing.
///
/// `/api/repos` answers every method the way it answers `GET`.
pub fn create_router(gateway: Gateway) -> Router {
    let router = Router::new()
        .route("/api/repos", any(handle_repos))
        .route("/api/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(middleware::from_fn(preflight));

    // Outside the preflight layer so 204s, errors and 404s are covered too.
    CORS_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Answer `OPTIONS` with an empty 204 before route dispatch.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/repos`
///
/// The cache key is the request path plus query, so distinct query strings
/// are cached independently.
async fn handle_repos(State(gateway): State<Gateway>, uri: Uri) -> Result<Response, ApiError> {
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let served = gateway.serve(&key).await?;
    Ok(payload_response(&gateway, served)?)
}

fn payload_response(gateway: &Gateway, served: Served) -> Result<Response, ShelfError> {
    let body = serde_json::to_vec(&served.payload)?;
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(value) = HeaderValue::from_str(&gateway.config().cache_control()) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(served.status.as_header()),
    );
    if served.status == CacheStatus::Hit {
        headers.insert(header::AGE, HeaderValue::from(served.age.as_secs()));
    }

    Ok(response)
}

/// `GET /api/health`
async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn handle_not_found(uri: Uri) -> ApiError {
    ApiError(ShelfError::NotFound(uri.path().to_string()))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Maps fetch failures onto JSON error responses.
#[derive(Debug)]
pub struct ApiError(ShelfError);

impl From<ShelfError> for ApiError {
    fn from(err: ShelfError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ShelfError::NotFound(path) = &self.0 {
            debug!(%path, "no route");
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }

        let (status, body) = match &self.0 {
            ShelfError::Upstream { status } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                json!({ "error": "GitHub API error", "status": status }),
            ),
            ShelfError::Timeout | ShelfError::Network(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": "GitHub fetch failed", "message": self.0.to_string() }),
            ),
            ShelfError::Parse(e) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "GitHub fetch failed", "message": e.to_string() }),
            ),
            other => {
                error!(error = %other, "internal gateway error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal error", "message": other.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
