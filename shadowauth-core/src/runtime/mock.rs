use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    AnalyticsEvent, ProofVerification, ProofVerificationRequest, RuntimeSessionStatus,
    RuntimeVerifier, SessionCheckRequest,
};
use crate::{
    error::ShadowAuthError,
    session::DEFAULT_SESSION_TTL,
    session_key::mock_tx_hash,
    utils::{add_millis, now_millis, redact},
    SessionKey,
};

/// Deterministic runtime used when no runtime credential is configured.
///
/// - every proof is accepted with a fresh session key and a pseudo transaction hash,
/// - every session is valid for the application the caller names,
/// - analytics and storage calls only log.
#[derive(Debug, Clone)]
pub struct MockRuntimeClient {
    session_ttl: Duration,
    latency: Duration,
}

impl Default for MockRuntimeClient {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl MockRuntimeClient {
    /// Creates a mock runtime issuing sessions with the given lifetime.
    #[must_use]
    pub const fn new(session_ttl: Duration) -> Self {
        Self {
            session_ttl,
            latency: Duration::ZERO,
        }
    }

    /// Adds a simulated round-trip delay to proof and session checks.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RuntimeVerifier for MockRuntimeClient {
    async fn verify_proof(
        &self,
        request: &ProofVerificationRequest,
    ) -> Result<ProofVerification, ShadowAuthError> {
        debug!(app_id = %request.app_id, "mock runtime: accepting proof");
        self.simulate_latency().await;

        let session_key = SessionKey::generate()?;
        let valid_until = add_millis(now_millis(), self.session_ttl);
        debug!(
            session_key = %redact(&session_key.to_hex()),
            "mock runtime: session key generated"
        );

        Ok(ProofVerification::Accepted {
            session_key,
            valid_until,
            tx_hash: Some(mock_tx_hash()?),
        })
    }

    async fn verify_session(&self, request: &SessionCheckRequest) -> RuntimeSessionStatus {
        debug!(
            session_key = %redact(&request.session_key),
            "mock runtime: session check"
        );
        self.simulate_latency().await;

        RuntimeSessionStatus {
            is_valid: true,
            app_id: Some(request.app_id.clone()),
            valid_until: Some(add_millis(now_millis(), self.session_ttl)),
            error: None,
        }
    }

    async fn record_analytics(&self, event: &AnalyticsEvent) {
        debug!(app_id = %event.app_id, event = %event.event, "mock runtime: analytics");
    }

    async fn store_confidential_data(&self, session_key: &SessionKey, _data: &Value) -> bool {
        debug!(session_key = %redact(&session_key.to_hex()), "mock runtime: storage");
        true
    }

    async fn health(&self) -> bool {
        true
    }

    async fn version(&self) -> Option<String> {
        Some("mock".to_string())
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::VerificationLevel;

    fn proof_request(app_id: &str) -> ProofVerificationRequest {
        ProofVerificationRequest {
            app_id: app_id.to_string(),
            nullifier_hash: "0x2bf8406809dcefb1a3a04c3b1d8d8a1ff9bb9e1aeb0a1a1a1a1a1a1a1a1a1a1a"
                .to_string(),
            merkle_root: "0x1f38b57f3bdf96f05ea62fa68814871bf0ca8ce4dbe073d8497d5a6b0a53e5e0"
                .to_string(),
            proof: "0x0a".to_string(),
            verification_level: VerificationLevel::Orb,
            signal: None,
        }
    }

    #[tokio::test]
    async fn test_mock_accepts_every_proof_with_24h_window() {
        let client = MockRuntimeClient::default();
        let before = now_millis();
        let result = client.verify_proof(&proof_request("demo")).await.unwrap();
        let after = now_millis();

        match result {
            ProofVerification::Accepted {
                valid_until,
                tx_hash,
                ..
            } => {
                assert!(valid_until >= before + 86_400_000);
                assert!(valid_until <= after + 86_400_000);
                let tx_hash = tx_hash.unwrap();
                assert_eq!(tx_hash.len(), 66);
                assert!(tx_hash.starts_with("0x"));
            }
            ProofVerification::Rejected { error } => panic!("unexpected rejection: {error}"),
        }
    }

    #[tokio::test]
    async fn test_mock_session_check_echoes_app_id() {
        let client = MockRuntimeClient::default();
        let status = client
            .verify_session(&SessionCheckRequest {
                session_key: "0x00".to_string(),
                app_id: "demo".to_string(),
                timestamp: now_millis(),
            })
            .await;
        assert_eq!(status.accepted_app_id(), Some("demo"));

        let status = client
            .verify_session(&SessionCheckRequest {
                session_key: "0x00".to_string(),
                app_id: String::new(),
                timestamp: now_millis(),
            })
            .await;
        assert!(status.is_valid);
        assert_eq!(status.accepted_app_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_latency_is_simulated() {
        let client = MockRuntimeClient::default().with_latency(Duration::from_millis(100));
        let started = tokio::time::Instant::now();
        client.verify_proof(&proof_request("demo")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
