//! HTTP surface tests against a mock-runtime coordinator.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shadowauth_core::{
    analytics::AnalyticsDispatcher,
    cache::MemorySessionCache,
    contract::{ContractSessionClient, JsonRpcTransport},
    health::HealthMonitor,
    identity::{IdentityProofVerifier, IdentityVerification, ZkProof},
    runtime::{MockRuntimeClient, RuntimeVerifier},
    SessionCoordinator,
};
use shadowauth_server::{router, AppState};
use tower::ServiceExt;

struct AcceptingIdentity;

#[async_trait]
impl IdentityProofVerifier for AcceptingIdentity {
    async fn verify(&self, proof: &ZkProof) -> IdentityVerification {
        IdentityVerification::Verified {
            nullifier_hash: proof.nullifier_hash.clone(),
        }
    }
}

struct RejectingIdentity;

#[async_trait]
impl IdentityProofVerifier for RejectingIdentity {
    async fn verify(&self, _proof: &ZkProof) -> IdentityVerification {
        IdentityVerification::Rejected {
            reason: "invalid_proof".to_string(),
        }
    }
}

fn app() -> (Router, HealthMonitor) {
    app_with_identity(Arc::new(AcceptingIdentity))
}

fn app_with_identity(identity: Arc<dyn IdentityProofVerifier>) -> (Router, HealthMonitor) {
    let runtime: Arc<dyn RuntimeVerifier> = Arc::new(MockRuntimeClient::default());
    let (analytics, _worker) = AnalyticsDispatcher::spawn(runtime.clone(), 16);
    let contract = ContractSessionClient::new(
        Address::repeat_byte(0x0c),
        false,
        Arc::new(JsonRpcTransport::new(
            "http://127.0.0.1:1",
            None,
            Duration::from_secs(1),
        )),
    );
    let coordinator = SessionCoordinator::new(
        runtime.clone(),
        identity,
        contract,
        Arc::new(MemorySessionCache::new()),
        analytics,
    );
    let monitor = HealthMonitor::spawn(runtime, Duration::from_secs(30));
    let state = AppState::new(Arc::new(coordinator), monitor.subscribe());
    (router(state), monitor)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn login_body(app_id: &str) -> String {
    json!({
        "appId": app_id,
        "zkProof": {
            "merkleRoot": "0x1f38b57f3bdf96f05ea62fa68814871bf0ca8ce4dbe073d8497d5a6b0a53e5e0",
            "nullifierHash": "0x2bf8406809dcefb1a3a04c3b1d8d8a1ff9bb9e1aeb0a1a1a1a1a1a1a1a1a1a1a",
            "proof": "0x0a1b2c3d",
            "verificationLevel": "orb",
        },
    })
    .to_string()
}

#[tokio::test]
async fn test_login_then_verify() {
    let (app, _monitor) = app();

    let (status, body) = call(&app, Method::POST, "/login", Some(&login_body("demo"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let session_key = body["sessionKey"].as_str().unwrap().to_string();
    assert_eq!(session_key.len(), 66);
    assert!(session_key.starts_with("0x"));
    assert!(body["validUntil"].as_u64().unwrap() > 0);
    assert_eq!(body["txHash"].as_str().unwrap().len(), 66);

    let verify = json!({"sessionKey": session_key, "appId": "demo"}).to_string();
    let (status, body) = call(&app, Method::POST, "/session/verify", Some(&verify)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["session"]["appId"], "demo");
    assert_eq!(body["session"]["source"], "runtime");
}

#[tokio::test]
async fn test_versioned_prefix_serves_the_same_routes() {
    let (app, _monitor) = app();

    let (status, body) =
        call(&app, Method::POST, "/api/v1/login", Some(&login_body("demo"))).await;
    assert_eq!(status, StatusCode::OK);

    let verify = json!({"sessionKey": body["sessionKey"]}).to_string();
    let (status, body) = call(&app, Method::POST, "/api/v1/session/verify", Some(&verify)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["source"], "fallback");
}

#[tokio::test]
async fn test_login_without_proof_is_bad_request() {
    let (app, _monitor) = app();

    let (status, body) = call(&app, Method::POST, "/login", Some(r#"{"appId":"demo"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing appId or zkProof");

    let (status, body) = call(&app, Method::POST, "/login", Some("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_login_with_rejected_proof_is_unauthorized() {
    let (app, _monitor) = app_with_identity(Arc::new(RejectingIdentity));

    let (status, body) = call(&app, Method::POST, "/login", Some(&login_body("demo"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"success": false, "error": "Invalid ZK proof"}));
}

#[tokio::test]
async fn test_verify_error_statuses() {
    let (app, _monitor) = app();

    let (status, body) = call(&app, Method::POST, "/session/verify", Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session key required");

    let unknown = json!({"sessionKey": format!("0x{}", "ab".repeat(32))}).to_string();
    let (status, body) = call(&app, Method::POST, "/session/verify", Some(&unknown)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid or expired session");

    let malformed = json!({"sessionKey": "0x1234"}).to_string();
    let (status, _) = call(&app, Method::POST, "/session/verify", Some(&malformed)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoke() {
    let (app, _monitor) = app();

    let (_, body) = call(&app, Method::POST, "/login", Some(&login_body("demo"))).await;
    let session = json!({"sessionKey": body["sessionKey"]}).to_string();

    let (status, body) = call(&app, Method::POST, "/session/revoke", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    // Without an appId the mock runtime does not vouch for the key, so the revoked fallback
    // record decides.
    let (status, _) = call(&app, Method::POST, "/session/verify", Some(&session)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_informational_endpoints() {
    let (app, _monitor) = app();

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    for uri in ["/login", "/session/verify", "/api/v1/login"] {
        let (status, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
        assert!(body["endpoints"].is_object());
    }

    let (status, body) = call(&app, Method::GET, "/runtime/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "mock");
}
