//! Gateway tests over a real listener: auth, rate limiting, and the full
//! review round trip against a scripted backend.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use synod_core::{SynodConfig, SynodError};
use synod_gateway::{router, AppState};
use synod_review::llm::{ChatBackend, ChatMessage};
use synod_review::service::ReviewService;

const API_KEY: &str = "test-review-key";

const DIFF: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,3 @@
+pub fn added() {}
";

struct CannedBackend;

#[async_trait]
impl ChatBackend for CannedBackend {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, SynodError> {
        if messages[0].content.contains("Principal Engineer") {
            return Ok(serde_json::json!({
                "summary": "Small additive change, nothing alarming.",
                "score": 9.0,
                "findings": []
            })
            .to_string());
        }
        Ok(serde_json::json!({"findings": []}).to_string())
    }

    fn model(&self) -> &str {
        "canned-model"
    }
}

async fn spawn_gateway(rate_limit: u32) -> SocketAddr {
    let mut config = SynodConfig::default();
    config.server.api_key = Some(API_KEY.into());
    config.server.rate_limit_per_minute = rate_limit;
    let config = Arc::new(config);

    let service = Arc::new(ReviewService::new(config.clone(), Arc::new(CannedBackend)));
    let state = AppState::new(config, service).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

fn review_body() -> serde_json::Value {
    serde_json::json!({ "diff": DIFF, "language": "rust" })
}

#[tokio::test]
async fn health_needs_no_auth() {
    let addr = spawn_gateway(10).await;
    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["llmProvider"], "openai");
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn review_requires_bearer_credential() {
    let addr = spawn_gateway(10).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/review"))
        .json(&review_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .post(format!("http://{addr}/review"))
        .bearer_auth("wrong-key")
        .json(&review_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 401);
    assert!(body.get("requestId").is_some());
}

#[tokio::test]
async fn review_round_trip_returns_shaped_result() {
    let addr = spawn_gateway(10).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/review"))
        .bearer_auth(API_KEY)
        .json(&review_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["score"], 9.0);
    assert!(body["findings"].as_array().unwrap().is_empty());
    assert_eq!(body["metadata"]["agentCount"], 5);
    assert_eq!(body["metadata"]["model"], "canned-model");
}

#[tokio::test]
async fn empty_diff_is_a_400() {
    let addr = spawn_gateway(10).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/review"))
        .bearer_auth(API_KEY)
        .json(&serde_json::json!({ "diff": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let addr = spawn_gateway(10).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/review"))
        .bearer_auth(API_KEY)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn rate_limit_returns_429_after_quota() {
    let addr = spawn_gateway(2).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(format!("http://{addr}/review"))
            .bearer_auth(API_KEY)
            .json(&review_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let response = client
        .post(format!("http://{addr}/review"))
        .bearer_auth(API_KEY)
        .json(&review_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("rate limit"));
}
