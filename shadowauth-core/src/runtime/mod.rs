//! Client for the off-chain runtime that gates proof acceptance and tracks session state.
//!
//! Two strategies implement [`RuntimeVerifier`]:
//!
//! - [`MockRuntimeClient`]: deterministic local behaviour for development, selected when no
//!   runtime credential is configured.
//! - [`LiveRuntimeClient`]: talks to the remote runtime over HTTPS.
//!
//! The strategy is chosen once at construction (see [`crate::config::ShadowAuthConfig`]).
//! Transport and protocol failures never cross this boundary as errors, they become negative
//! results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ShadowAuthError, identity::VerificationLevel, SessionKey};

mod live;
mod mock;

pub use live::LiveRuntimeClient;
pub use mock::MockRuntimeClient;

/// Proof material forwarded to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofVerificationRequest {
    /// The relying application.
    pub app_id: String,
    /// Nullifier confirmed by the identity service.
    pub nullifier_hash: String,
    /// Merkle root the proof was generated against.
    pub merkle_root: String,
    /// The encoded zero-knowledge proof.
    pub proof: String,
    /// Verification level the proof was generated with.
    pub verification_level: VerificationLevel,
    /// Optional signal bound to the proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Outcome of [`RuntimeVerifier::verify_proof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofVerification {
    /// The runtime accepted the proof. Session material is generated locally; the runtime is
    /// only authoritative on proof validity.
    Accepted {
        /// Fresh session key.
        session_key: SessionKey,
        /// Expiry in unix milliseconds.
        valid_until: u64,
        /// Transaction hash reported by the runtime, if any.
        tx_hash: Option<String>,
    },
    /// The runtime rejected the proof or could not be reached.
    Rejected {
        /// Reason for logs. Never shown to callers.
        error: String,
    },
}

/// Session check forwarded to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheckRequest {
    /// Session key in its textual form.
    pub session_key: String,
    /// Application the caller expects, empty when not supplied.
    pub app_id: String,
    /// Request time in unix milliseconds.
    pub timestamp: u64,
}

/// Runtime view of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSessionStatus {
    /// Whether the runtime considers the session valid.
    #[serde(default)]
    pub is_valid: bool,
    /// Application the session belongs to.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Expiry in unix milliseconds.
    #[serde(default)]
    pub valid_until: Option<u64>,
    /// Error reported by the runtime or the transport.
    #[serde(default)]
    pub error: Option<String>,
}

impl RuntimeSessionStatus {
    /// Negative result carrying an error.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// The runtime result counts as an acceptance only with a non-empty application id.
    #[must_use]
    pub fn accepted_app_id(&self) -> Option<&str> {
        if !self.is_valid {
            return None;
        }
        self.app_id.as_deref().filter(|app_id| !app_id.is_empty())
    }
}

/// An analytics event sent to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Application the event belongs to.
    pub app_id: String,
    /// Event name, e.g. `session_created`.
    pub event: String,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Event time in unix milliseconds.
    pub timestamp: u64,
}

/// The off-chain runtime interface.
#[async_trait]
pub trait RuntimeVerifier: Send + Sync {
    /// Verifies a proof. Acceptance is the gating check for issuing a session.
    ///
    /// # Errors
    /// Only when session material cannot be generated ([`ShadowAuthError::Entropy`]). A rejected
    /// proof or an unreachable runtime is [`ProofVerification::Rejected`].
    async fn verify_proof(
        &self,
        request: &ProofVerificationRequest,
    ) -> Result<ProofVerification, ShadowAuthError>;

    /// Checks a session. Never fails: errors are reported through
    /// [`RuntimeSessionStatus::error`].
    async fn verify_session(&self, request: &SessionCheckRequest) -> RuntimeSessionStatus;

    /// Records an analytics event. Errors are logged and swallowed.
    async fn record_analytics(&self, event: &AnalyticsEvent);

    /// Stores confidential data next to a session. Returns whether the runtime accepted it.
    async fn store_confidential_data(&self, session_key: &SessionKey, data: &Value) -> bool;

    /// Whether the runtime answers its health endpoint.
    async fn health(&self) -> bool;

    /// Version reported by the runtime.
    async fn version(&self) -> Option<String>;

    /// Short name for logs (`mock` or `live`).
    fn mode(&self) -> &'static str;
}
