use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shadowauth_core::{health::RuntimeStatus, identity::ZkProof, ShadowAuthError, VerifiedSession};

use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default)]
    zk_proof: Option<ZkProof>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    success: bool,
    session_key: String,
    valid_until: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    session_key: Option<String>,
    #[serde(default)]
    app_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    success: bool,
    session: VerifiedSession,
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = body?;
    let (Some(app_id), Some(proof)) = (request.app_id, request.zk_proof) else {
        return Err(ShadowAuthError::InvalidRequest("Missing appId or zkProof".to_string()).into());
    };

    let outcome = state.coordinator.login(&app_id, &proof).await?;
    Ok(Json(LoginResponse {
        success: true,
        session_key: outcome.session_key.to_hex(),
        valid_until: outcome.valid_until,
        tx_hash: outcome.tx_hash,
    }))
}

pub async fn verify_session(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(request) = body?;
    let session = state
        .coordinator
        .verify(
            request.session_key.as_deref().unwrap_or_default(),
            request.app_id.as_deref(),
        )
        .await?;
    Ok(Json(VerifyResponse {
        success: true,
        session,
    }))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    state
        .coordinator
        .revoke(request.session_key.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn runtime_status(State(state): State<AppState>) -> Json<RuntimeStatus> {
    Json(state.runtime_status.borrow().clone())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn login_info() -> Json<Value> {
    Json(json!({
        "message": "ShadowAuth login. POST a World ID proof to receive an anonymous session key.",
        "endpoints": {
            "POST /login": {
                "appId": "string",
                "zkProof": {
                    "merkleRoot": "string",
                    "nullifierHash": "string",
                    "proof": "string",
                    "verificationLevel": "orb | device | document | secure_document",
                    "signal": "string (optional)",
                },
            },
        },
    }))
}

pub async fn verify_info() -> Json<Value> {
    Json(json!({
        "message": "ShadowAuth session verification. POST a session key to check it.",
        "endpoints": {
            "POST /session/verify": {
                "sessionKey": "string",
                "appId": "string (optional)",
            },
            "POST /session/revoke": {
                "sessionKey": "string",
            },
        },
    }))
}
