//! Sweat analysis HTTP API
//!
//! Axum-based HTTP server standing in for the strip form: a frontend posts
//! the four readings to `/analyze` and renders the score, insight and
//! notification it gets back.
//!
//! Each endpoint has a thin axum handler that delegates to a pure inner
//! function, so the inner functions can be tested without axum dispatch.
//!
//! Endpoints:
//! - GET  /health  — health check, including the database for the postgres store
//! - GET  /version — server version info
//! - POST /analyze — run one strip submission

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sweat_core::identity::{IdentityProvider, Profile, StaticIdentity};
use sweat_core::insight::{GeminiInsightClient, InsightBackend};
use sweat_core::notify::{Notification, TracingNotifier};
use sweat_core::store::{create_store, ResultStore};
use sweat_core::{
    Analyzer, Category, Readings, RiskScorer, SubmissionOutcome, SubmitError, SweatConfig,
    SweatError,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub analyzer: Arc<Analyzer>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl HttpState {
    /// Wire the analyzer and collaborators from configuration.
    pub async fn from_config(config: &SweatConfig) -> Result<Self, SweatError> {
        let insight: Arc<dyn InsightBackend> =
            Arc::new(GeminiInsightClient::from_config(&config.insight)?);

        let store: Arc<dyn ResultStore> = Arc::from(create_store(config).await?);
        tracing::info!(store = store.name(), model = %config.insight.model, "Result store ready");

        let analyzer = Analyzer::new(
            RiskScorer::new(config.scoring.denominator),
            insight,
            store,
            Arc::new(TracingNotifier),
        );

        Ok(Self {
            analyzer: Arc::new(analyzer),
            identity: Arc::new(StaticIdentity::new(Profile::from(&config.identity))),
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/analyze", post(analyze_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    config: &SweatConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Sweat analysis API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<Category>>,
    pub score: Option<u8>,
    pub insight: Option<String>,
    pub notification: Notification,
    pub states: Vec<String>,
}

impl From<&SubmissionOutcome> for AnalyzeResponse {
    fn from(outcome: &SubmissionOutcome) -> Self {
        let missing = match &outcome.error {
            Some(SubmitError::MissingInput { missing }) => Some(missing.clone()),
            _ => None,
        };
        Self {
            state: outcome.state().as_str().to_string(),
            error_kind: outcome.error_kind().map(|k| k.as_str().to_string()),
            error: outcome.error.as_ref().and_then(public_error),
            missing,
            score: outcome.score.map(|s| s.value()),
            insight: outcome.insight.as_ref().map(|i| i.as_str().to_string()),
            notification: outcome.notification.clone(),
            states: outcome.states.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Error text safe to hand back to the caller. Insight failures stay generic;
/// their detail only goes to the server log.
fn public_error(error: &SubmitError) -> Option<String> {
    match error {
        SubmitError::InsightUnavailable(_) => None,
        other => Some(other.to_string()),
    }
}

/// HTTP status for a finished submission.
pub fn status_for(outcome: &SubmissionOutcome) -> StatusCode {
    match &outcome.error {
        None => StatusCode::OK,
        Some(SubmitError::MissingInput { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(SubmitError::InsightUnavailable(_)) | Some(SubmitError::PersistFailed(_)) => {
            StatusCode::BAD_GATEWAY
        }
        Some(SubmitError::Busy) => StatusCode::CONFLICT,
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — probes the result store, returns (status_code, json_body).
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let store = state.analyzer.store();

    match store.health().await {
        Ok(backend_version) => {
            let mut body = serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
            });
            if let (Some(v), Some(obj)) = (backend_version, body.as_object_mut()) {
                obj.insert("postgresql".to_string(), serde_json::json!(v));
            }
            (StatusCode::OK, body)
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "store": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the submitting profile: the `x-user-id` header when present,
/// otherwise the configured identity.
pub fn resolve_profile(
    identity: &dyn IdentityProvider,
    user_header: Option<&str>,
) -> std::result::Result<Profile, String> {
    match user_header.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map(Profile::for_user)
            .map_err(|e| format!("invalid {} header: {}", USER_ID_HEADER, e)),
        None => Ok(identity.profile()),
    }
}

/// Inner analyze — runs one submission and maps the outcome to HTTP.
pub async fn analyze_inner(
    state: &HttpState,
    user_header: Option<&str>,
    readings: Readings,
) -> (StatusCode, serde_json::Value) {
    let profile = match resolve_profile(state.identity.as_ref(), user_header) {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": e,
                    "status": "error",
                }),
            );
        }
    };

    let outcome = state.analyzer.submit(readings, profile).await;
    let status = status_for(&outcome);
    let body = serde_json::to_value(AnalyzeResponse::from(&outcome))
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string(), "status": "error" }));

    (status, body)
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(readings): Json<Readings>,
) -> impl IntoResponse {
    let user_header = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let (status, body) = analyze_inner(&state, user_header, readings).await;
    (status, Json(body))
}
