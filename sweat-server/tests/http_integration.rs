//! HTTP integration tests for the sweat analysis API
//!
//! The Gemini and PostgREST backends are replaced by wiremock servers, so the
//! full router → analyzer → HTTP client path runs without external services.
//! Requests go through the Axum router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sweat_core::identity::{Profile, StaticIdentity};
use sweat_core::insight::{GeminiConfig, GeminiInsightClient};
use sweat_core::notify::CollectingNotifier;
use sweat_core::store::RestResultStore;
use sweat_core::{Analyzer, RiskScorer};
use sweat_server::http::{build_router, HttpState};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIGURED_USER: &str = "6f1c2b1e-8d55-4a53-9d5b-3f8f4f1b2a10";

struct TestApp {
    state: Arc<HttpState>,
    gemini: MockServer,
    store: MockServer,
    notifier: Arc<CollectingNotifier>,
}

async fn make_app() -> TestApp {
    let gemini = MockServer::start().await;
    let insight = GeminiInsightClient::with_base_url(
        GeminiConfig::new("test-api-key", "gemini-1.5-flash"),
        gemini.uri(),
    )
    .expect("Failed to create insight client");
    make_app_with(gemini, insight).await
}

async fn make_app_with(gemini: MockServer, insight: GeminiInsightClient) -> TestApp {
    let store = MockServer::start().await;
    let results = RestResultStore::new(store.uri(), "anon-key", None, "sweat_results")
        .expect("Failed to create result store");
    let notifier = Arc::new(CollectingNotifier::new());

    let analyzer = Analyzer::new(
        RiskScorer::default(),
        Arc::new(insight),
        Arc::new(results),
        notifier.clone(),
    );
    let profile = Profile::for_user(Uuid::parse_str(CONFIGURED_USER).unwrap());

    TestApp {
        state: Arc::new(HttpState {
            analyzer: Arc::new(analyzer),
            identity: Arc::new(StaticIdentity::new(profile)),
        }),
        gemini,
        store,
        notifier,
    }
}

fn gemini_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

fn analyze_request(body: Value, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    send_to(app.state.clone(), request).await
}

async fn send_to(state: Arc<HttpState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn mild_body() -> Value {
    json!({
        "glucose": "Moderate",
        "ph": "Neutral",
        "cortisol": "Faint",
        "salt": "Moderate"
    })
}

// ===========================================================================
// TEST 1: successful analysis is scored, cleaned, saved and reported
// ===========================================================================
#[tokio::test]
async fn test_analyze_success_saves_record() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(gemini_reply("**Summary**: mild signals. **Tip**: sleep well."))
        .expect(1)
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/sweat_results"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.store)
        .await;

    let (status, body) = send(&app, analyze_request(mild_body(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "done");
    assert_eq!(body["score"], 67);
    assert_eq!(body["insight"], "Summary: mild signals. Tip: sleep well.");
    assert_eq!(body["notification"]["title"], "Success");
    assert_eq!(body["notification"]["severity"], "default");
    assert_eq!(
        body["states"],
        json!(["idle", "validating", "scoring", "requesting_insight", "persisting", "done"])
    );
    assert!(body.get("error_kind").is_none());

    let requests = app.store.received_requests().await.unwrap();
    let rows: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(rows[0]["user_id"], CONFIGURED_USER);
    assert_eq!(rows[0]["glucose"], "Moderate");
    assert_eq!(rows[0]["ai_insight"], "Summary: mild signals. Tip: sleep well.");
    assert_eq!(rows[0]["pcos_score"], 67);
}

// ===========================================================================
// TEST 2: missing readings → 422, no outbound calls
// ===========================================================================
#[tokio::test]
async fn test_analyze_missing_fields_makes_no_calls() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("unused"))
        .expect(0)
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.store)
        .await;

    let (status, body) = send(
        &app,
        analyze_request(json!({ "glucose": "dark", "ph": "", "cortisol": "faint" }), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["state"], "error");
    assert_eq!(body["error_kind"], "missing_input");
    assert_eq!(body["missing"], json!(["ph", "salt"]));
    assert_eq!(body["notification"]["title"], "Missing Fields");
    assert!(body["score"].is_null());
}

// ===========================================================================
// TEST 3: insight failure → 502, score kept, nothing persisted
// ===========================================================================
#[tokio::test]
async fn test_analyze_insight_failure_skips_store() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "Internal error" }
        })))
        .expect(1)
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.store)
        .await;

    let (status, body) = send(&app, analyze_request(mild_body(), None)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_kind"], "insight_unavailable");
    assert_eq!(body["score"], 67);
    assert!(body["insight"].is_null());
    assert_eq!(body["notification"]["title"], "Save Error");
    assert_eq!(
        body["notification"]["description"],
        "Could not save the result or fetch AI insight."
    );
    assert!(body.get("error").is_none());
}

// ===========================================================================
// TEST 4: store failure → 502, score and insight still returned
// ===========================================================================
#[tokio::test]
async fn test_analyze_store_failure_keeps_results() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("Keep going!"))
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy for table \"sweat_results\""
        })))
        .expect(1)
        .mount(&app.store)
        .await;

    let (status, body) = send(&app, analyze_request(mild_body(), None)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_kind"], "persist_failed");
    assert_eq!(body["score"], 67);
    assert_eq!(body["insight"], "Keep going!");
    assert_eq!(body["notification"]["title"], "Save Failed");
    assert_eq!(
        body["notification"]["description"],
        "new row violates row-level security policy for table \"sweat_results\""
    );

    let seen = app.notifier.notifications();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].title, "Save Failed");
}

// ===========================================================================
// TEST 5: x-user-id header attributes the record
// ===========================================================================
#[tokio::test]
async fn test_analyze_uses_user_header() {
    let app = make_app().await;
    let header_user = "0b6f4a3e-1c2d-4e5f-8a9b-0c1d2e3f4a5b";

    Mock::given(method("POST"))
        .respond_with(gemini_reply("ok"))
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&app.store)
        .await;

    let (status, _) = send(&app, analyze_request(mild_body(), Some(header_user))).await;
    assert_eq!(status, StatusCode::OK);

    let requests = app.store.received_requests().await.unwrap();
    let rows: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(rows[0]["user_id"], header_user);
}

// ===========================================================================
// TEST 6: malformed x-user-id → 400 before any work
// ===========================================================================
#[tokio::test]
async fn test_analyze_rejects_bad_user_header() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("unused"))
        .expect(0)
        .mount(&app.gemini)
        .await;

    let (status, body) = send(&app, analyze_request(mild_body(), Some("user-42"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(app.notifier.notifications().is_empty());
}

// ===========================================================================
// TEST 7: strongly positive strip saturates at 100
// ===========================================================================
#[tokio::test]
async fn test_analyze_strong_strip_scores_100() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("Please consult a doctor."))
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&app.store)
        .await;

    let body = json!({
        "glucose": "Dark Blue",
        "ph": "Purple",
        "cortisol": "Dark Brown",
        "salt": "High"
    });
    let (status, body) = send(&app, analyze_request(body, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 100);
}

// ===========================================================================
// TEST 8: GET /health and GET /version
// ===========================================================================
#[tokio::test]
async fn test_health_and_version() {
    let app = make_app().await;

    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "rest");
    assert!(body["version"].is_string());

    let (status, body) = send(
        &app,
        Request::builder().uri("/version").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "sweat-server");
}

// ===========================================================================
// TEST 9: unreachable insight service never leaks the API key
// ===========================================================================
#[tokio::test]
async fn test_analyze_transport_failure_hides_api_key() {
    let gemini = MockServer::start().await;
    let insight = GeminiInsightClient::with_base_url(
        GeminiConfig::new("SECRET-GEMINI-KEY", "gemini-1.5-flash"),
        "http://127.0.0.1:1".to_string(),
    )
    .expect("Failed to create insight client");
    let app = make_app_with(gemini, insight).await;

    let response = build_router(app.state.clone())
        .oneshot(analyze_request(mild_body(), None))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let raw = String::from_utf8_lossy(&bytes);
    assert!(!raw.contains("SECRET-GEMINI-KEY"), "key leaked: {}", raw);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error_kind"], "insight_unavailable");
    assert_eq!(body["notification"]["title"], "Save Error");
}

// ===========================================================================
// TEST 10: null readings take the MissingInput path
// ===========================================================================
#[tokio::test]
async fn test_analyze_null_fields_are_missing() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("unused"))
        .expect(0)
        .mount(&app.gemini)
        .await;

    let body = json!({
        "glucose": null,
        "ph": "Neutral",
        "cortisol": null,
        "salt": "Moderate"
    });
    let (status, body) = send(&app, analyze_request(body, None)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_kind"], "missing_input");
    assert_eq!(body["missing"], json!(["glucose", "cortisol"]));
    assert_eq!(body["notification"]["title"], "Missing Fields");
    assert_eq!(
        body["notification"]["description"],
        "Please fill in all test results."
    );
}

// ===========================================================================
// TEST 11: overlapping submit for the same user → 409 Busy
// ===========================================================================
#[tokio::test]
async fn test_analyze_overlapping_submit_is_busy() {
    let app = make_app().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("Slow but steady.").set_delay(Duration::from_millis(800)))
        .expect(1)
        .mount(&app.gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.store)
        .await;

    let first = tokio::spawn(send_to(
        app.state.clone(),
        analyze_request(mild_body(), None),
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (status, body) = send(&app, analyze_request(mild_body(), None)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "busy");
    assert_eq!(body["states"], json!(["idle", "error(busy)"]));
    assert_eq!(body["notification"]["title"], "Analysis In Progress");
    assert_eq!(
        body["notification"]["description"],
        "Please wait for the current analysis to finish."
    );
    assert!(body["score"].is_null());

    let (status, body) = first.await.expect("first request task panicked");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "done");
}
