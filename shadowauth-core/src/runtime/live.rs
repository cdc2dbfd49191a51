use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    AnalyticsEvent, ProofVerification, ProofVerificationRequest, RuntimeSessionStatus,
    RuntimeVerifier, SessionCheckRequest,
};
use crate::{
    error::ShadowAuthError,
    http_request::Request,
    utils::{add_millis, now_millis, redact},
    Network, SessionKey,
};

/// Client for a deployed runtime. Every call carries the bearer credential and the network
/// name.
#[derive(Debug)]
pub struct LiveRuntimeClient {
    endpoint: String,
    api_key: SecretString,
    network: Network,
    session_ttl: Duration,
    request: Request,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkEnvelope<'a, T: Serialize> {
    #[serde(flatten)]
    body: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    network: Network,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyProofResponse {
    #[serde(default)]
    success: bool,
    tx_hash: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreRequest {
    session_key: String,
    encrypted_data: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

impl LiveRuntimeClient {
    /// Creates a client for the runtime at `endpoint`.
    ///
    /// `require_https` refuses to send anything over plain http; it is set for mainnet.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        network: Network,
        session_ttl: Duration,
        timeout: Duration,
        require_https: bool,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            network,
            session_ttl,
            request: Request::new(timeout, require_https),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    fn authorized_post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        timestamp: Option<u64>,
    ) -> RequestBuilder {
        self.request
            .post(&self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(&NetworkEnvelope {
                body,
                timestamp,
                network: self.network,
            })
    }

    async fn try_verify_proof(
        &self,
        request: &ProofVerificationRequest,
    ) -> Result<VerifyProofResponse, String> {
        let response = self
            .request
            .handle(self.authorized_post("/api/verify", request, Some(now_millis())))
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("ROFL verification failed: {status}"));
        }

        response
            .json::<VerifyProofResponse>()
            .await
            .map_err(|e| format!("invalid runtime response: {e}"))
    }

    async fn try_verify_session(
        &self,
        request: &SessionCheckRequest,
    ) -> Result<RuntimeSessionStatus, ShadowAuthError> {
        let response = self
            .request
            .handle_idempotent(self.authorized_post("/api/session/verify", request, None))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShadowAuthError::UpstreamUnavailable {
                url: self.url("/api/session/verify"),
                status: Some(status.as_u16()),
                error: "ROFL session verification failed".to_string(),
            });
        }

        response
            .json::<RuntimeSessionStatus>()
            .await
            .map_err(|e| ShadowAuthError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl RuntimeVerifier for LiveRuntimeClient {
    async fn verify_proof(
        &self,
        request: &ProofVerificationRequest,
    ) -> Result<ProofVerification, ShadowAuthError> {
        debug!(app_id = %request.app_id, "runtime: verifying proof");

        let result = match self.try_verify_proof(request).await {
            Ok(result) => result,
            Err(error) => {
                warn!(%error, "runtime: proof verification error");
                return Ok(ProofVerification::Rejected { error });
            }
        };

        if !result.success {
            return Ok(ProofVerification::Rejected {
                error: result
                    .error
                    .unwrap_or_else(|| "Verification failed".to_string()),
            });
        }

        let session_key = SessionKey::generate()?;
        let valid_until = add_millis(now_millis(), self.session_ttl);
        info!(
            session_key = %redact(&session_key.to_hex()),
            "runtime: proof accepted, session key generated"
        );

        Ok(ProofVerification::Accepted {
            session_key,
            valid_until,
            tx_hash: result.tx_hash,
        })
    }

    async fn verify_session(&self, request: &SessionCheckRequest) -> RuntimeSessionStatus {
        debug!(
            session_key = %redact(&request.session_key),
            "runtime: verifying session"
        );
        match self.try_verify_session(request).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "runtime: session verification error");
                RuntimeSessionStatus::invalid(e.to_string())
            }
        }
    }

    async fn record_analytics(&self, event: &AnalyticsEvent) {
        let request = self.authorized_post("/api/analytics", event, None);
        match self.request.handle(request).await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), event = %event.event, "runtime: analytics rejected");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, event = %event.event, "runtime: analytics error"),
        }
    }

    async fn store_confidential_data(&self, session_key: &SessionKey, data: &Value) -> bool {
        let body = StoreRequest {
            session_key: session_key.to_hex(),
            encrypted_data: STANDARD.encode(data.to_string()),
        };
        let request = self.authorized_post("/api/storage/store", &body, Some(now_millis()));
        match self.request.handle(request).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "runtime: storage error");
                false
            }
        }
    }

    async fn health(&self) -> bool {
        let request = self.request.get(&self.url("/health"));
        self.request
            .handle_idempotent(request)
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    async fn version(&self) -> Option<String> {
        let request = self.request.get(&self.url("/version"));
        let response = self.request.handle_idempotent(request).await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response
            .json::<VersionResponse>()
            .await
            .ok()
            .map(|body| body.version)
    }

    fn mode(&self) -> &'static str {
        "live"
    }
}
