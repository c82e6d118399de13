use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use synod_core::{ReviewRequest, SynodConfig, SynodError};
use synod_review::service::ReviewService;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::rate::RateLimiter;

/// Headroom above the diff limit for the JSON envelope around it.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<SynodConfig>,
    service: Arc<ReviewService>,
    limiter: Arc<RateLimiter>,
    started: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the gateway state.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Config`] when no review API key is configured;
    /// an unauthenticated gateway must not start.
    pub fn new(config: Arc<SynodConfig>, service: Arc<ReviewService>) -> Result<Self, SynodError> {
        if config.server.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(SynodError::Config(
                "server.api_key (or REVIEW_API_KEY) must be set to serve".into(),
            ));
        }
        let limiter = Arc::new(RateLimiter::new(config.server.rate_limit_per_minute));
        Ok(Self {
            config,
            service,
            limiter,
            started: Instant::now(),
        })
    }
}

#[derive(Clone)]
struct RequestId(String);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    llm_provider: String,
    uptime_seconds: u64,
}

struct ApiError {
    status: StatusCode,
    message: String,
    request_id: String,
}

impl ApiError {
    fn from_synod(err: &SynodError, request_id: String) -> Self {
        Self {
            status: status_for(err),
            message: err.to_string(),
            request_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "statusCode": self.status.as_u16(),
            "requestId": self.request_id,
        });
        (self.status, Json(body)).into_response()
    }
}

fn status_for(err: &SynodError) -> StatusCode {
    match err {
        SynodError::Validation(_) => StatusCode::BAD_REQUEST,
        SynodError::DiffTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SynodError::Auth(_) => StatusCode::UNAUTHORIZED,
        SynodError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        SynodError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SynodError::Analysis(_)
        | SynodError::Llm(_)
        | SynodError::Config(_)
        | SynodError::Io(_)
        | SynodError::Serialization(_)
        | SynodError::Toml(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let body_limit =
        DefaultBodyLimit::max(state.config.review.max_diff_bytes + BODY_OVERHEAD_BYTES);
    Router::new()
        .route("/health", get(handle_health))
        .route("/review", post(handle_review))
        .layer(body_limit)
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
///
/// # Errors
///
/// Returns [`SynodError::Io`] if the address cannot be bound.
pub async fn serve(state: AppState) -> Result<(), SynodError> {
    let bind = state.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, provider = %state.config.llm.provider, "gateway listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn log_requests(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().simple().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        %request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_provider: state.config.llm.provider.clone(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

async fn handle_review(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<synod_core::ReviewResult>, ApiError> {
    let expected = state.config.server.api_key.as_deref().unwrap_or("");
    let credential = authorize(&headers, expected)
        .map_err(|e| ApiError::from_synod(&e, request_id.clone()))?;

    state
        .limiter
        .check(&credential)
        .map_err(|e| ApiError::from_synod(&e, request_id.clone()))?;

    let Json(request) = body.map_err(|rejection| ApiError {
        status: rejection.status(),
        message: rejection.body_text(),
        request_id: request_id.clone(),
    })?;

    match state.service.review(request).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            warn!(%request_id, error = %err, "review request failed");
            Err(ApiError::from_synod(&err, request_id))
        }
    }
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<String, SynodError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| SynodError::Auth("missing Authorization header".into()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| SynodError::Auth("expected a Bearer credential".into()))?;
    if token.is_empty() || token != expected {
        return Err(SynodError::Auth("invalid API key".into()));
    }
    Ok(token.to_string())
}
