//! Boundary to the external identity-verification service (World ID cloud verification).
//!
//! The zero-knowledge proof itself is never checked locally.

use std::time::Duration;

use alloy_primitives::{keccak256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, error, warn};

use crate::http_request::Request;

/// Default base URL of the World ID developer portal.
pub const DEFAULT_WORLD_ID_BASE_URL: &str = "https://developer.worldcoin.org";

/// Verification level a World ID proof was generated with.
///
/// More details in `https://docs.world.org/world-id/concepts#proof-of-personhood`
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    /// Biometrically verified at an Orb.
    #[default]
    Orb,
    /// Semi-unique device.
    Device,
    /// ICAO-9303 government-issued document holder.
    Document,
    /// ICAO-9303 document holder with additional presence checks.
    SecureDocument,
}

/// Proof material as produced by the World ID widget.
///
/// Both the camelCase field names of the login API and the snake_case names emitted by IDKit
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProof {
    /// Merkle root of the identity set.
    #[serde(alias = "merkle_root")]
    pub merkle_root: String,
    /// Nullifier for this human and action.
    #[serde(alias = "nullifier_hash")]
    pub nullifier_hash: String,
    /// Encoded proof.
    pub proof: String,
    /// Verification level of the credential used.
    #[serde(default, alias = "verification_level")]
    pub verification_level: VerificationLevel,
    /// Optional signal bound to the proof.
    #[serde(default)]
    pub signal: Option<String>,
}

impl ZkProof {
    /// Whether every mandatory field carries a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.merkle_root.is_empty() && !self.nullifier_hash.is_empty() && !self.proof.is_empty()
    }
}

/// Outcome of an identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityVerification {
    /// The proof is valid for the configured application and action.
    Verified {
        /// Nullifier confirmed by the service.
        nullifier_hash: String,
    },
    /// The proof was rejected or the service could not be reached.
    Rejected {
        /// Reason, for logs.
        reason: String,
    },
}

/// Validates an externally supplied proof and its nullifier.
#[async_trait]
pub trait IdentityProofVerifier: Send + Sync {
    /// Verifies `proof`. Never fails; problems are rejections.
    async fn verify(&self, proof: &ZkProof) -> IdentityVerification;
}

/// World ID hash-to-field of a signal: keccak256 shifted right by 8 bits so it fits the field.
///
/// `0x`-prefixed hex signals are hashed as bytes, anything else as its UTF-8 encoding.
#[must_use]
pub fn hash_signal(signal: &str) -> String {
    let bytes = signal
        .strip_prefix("0x")
        .and_then(|digits| hex::decode(digits).ok())
        .unwrap_or_else(|| signal.as_bytes().to_vec());
    let hash = U256::from_be_bytes(keccak256(bytes).0) >> 8;
    format!("{hash:#066x}")
}

#[derive(Serialize)]
struct CloudVerifyRequest<'a> {
    nullifier_hash: &'a str,
    merkle_root: &'a str,
    proof: &'a str,
    verification_level: VerificationLevel,
    action: &'a str,
    signal_hash: String,
}

#[derive(Deserialize, Default)]
struct CloudVerifyError {
    code: Option<String>,
    detail: Option<String>,
}

/// Verifies proofs against the World ID cloud verification API.
#[derive(Debug)]
pub struct WorldIdCloudVerifier {
    base_url: String,
    app_id: String,
    action: String,
    request: Request,
}

impl WorldIdCloudVerifier {
    /// Creates a verifier for `app_id` and `action`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        action: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let require_https = base_url.starts_with("https");
        Self {
            base_url,
            app_id: app_id.into(),
            action: action.into(),
            request: Request::new(timeout, require_https),
        }
    }

    async fn try_verify(&self, proof: &ZkProof) -> Result<(), String> {
        let url = format!("{}/api/v2/verify/{}", self.base_url, self.app_id);
        let body = CloudVerifyRequest {
            nullifier_hash: &proof.nullifier_hash,
            merkle_root: &proof.merkle_root,
            proof: &proof.proof,
            verification_level: proof.verification_level,
            action: &self.action,
            signal_hash: hash_signal(proof.signal.as_deref().unwrap_or_default()),
        };

        let response = self
            .request
            .handle(self.request.post(&url).json(&body))
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let details = response
            .json::<CloudVerifyError>()
            .await
            .unwrap_or_default();
        Err(format!(
            "{} ({})",
            details
                .detail
                .unwrap_or_else(|| "verification failed".to_string()),
            details.code.unwrap_or_else(|| status.as_u16().to_string()),
        ))
    }
}

#[async_trait]
impl IdentityProofVerifier for WorldIdCloudVerifier {
    async fn verify(&self, proof: &ZkProof) -> IdentityVerification {
        match self.try_verify(proof).await {
            Ok(()) => {
                debug!(level = %proof.verification_level, "world id: proof verified");
                IdentityVerification::Verified {
                    nullifier_hash: proof.nullifier_hash.clone(),
                }
            }
            Err(reason) => {
                warn!(%reason, "world id: proof rejected");
                IdentityVerification::Rejected { reason }
            }
        }
    }
}

/// Stand-in used when the World ID application or action is not configured. Rejects every
/// proof.
#[derive(Debug, Default)]
pub struct UnconfiguredIdentityVerifier;

#[async_trait]
impl IdentityProofVerifier for UnconfiguredIdentityVerifier {
    async fn verify(&self, _proof: &ZkProof) -> IdentityVerification {
        error!("world id: application or action id missing, rejecting proof");
        IdentityVerification::Rejected {
            reason: "identity verification is not configured".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn proof() -> ZkProof {
        ZkProof {
            merkle_root: "0x1f38b57f3bdf96f05ea62fa68814871bf0ca8ce4dbe073d8497d5a6b0a53e5e0"
                .to_string(),
            nullifier_hash: "0x0339861e70a9bdb6b01a88c7534a3332db915d3d06511b79a5724221a6958fbe"
                .to_string(),
            proof: "0x063942fd7ea1616f17787d2e3374c1826ebcd2d41d2394".to_string(),
            verification_level: VerificationLevel::Orb,
            signal: None,
        }
    }

    #[test]
    fn test_zk_proof_accepts_both_casings() {
        let camel: ZkProof = serde_json::from_value(json!({
            "merkleRoot": "0x1",
            "nullifierHash": "0x2",
            "proof": "0x3",
            "verificationLevel": "device",
        }))
        .unwrap();
        let snake: ZkProof = serde_json::from_value(json!({
            "merkle_root": "0x1",
            "nullifier_hash": "0x2",
            "proof": "0x3",
            "verification_level": "device",
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.verification_level, VerificationLevel::Device);
    }

    #[test]
    fn test_hash_signal_empty() {
        // hashToField("") as computed by IDKit.
        assert_eq!(
            hash_signal(""),
            "0x00c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a4"
        );
    }

    #[test]
    fn test_hash_signal_fits_field() {
        let hash = hash_signal("my_signal");
        assert_eq!(hash.len(), 66);
        assert!(hash.starts_with("0x00"));
    }

    #[tokio::test]
    async fn test_cloud_verifier_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/verify/app_staging_123")
            .match_body(Matcher::PartialJson(json!({
                "action": "login",
                "verification_level": "orb",
                "signal_hash": hash_signal(""),
            })))
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let verifier = WorldIdCloudVerifier::new(
            server.url(),
            "app_staging_123",
            "login",
            Duration::from_secs(2),
        );
        let result = verifier.verify(&proof()).await;

        mock.assert_async().await;
        assert_eq!(
            result,
            IdentityVerification::Verified {
                nullifier_hash: proof().nullifier_hash
            }
        );
    }

    #[tokio::test]
    async fn test_cloud_verifier_rejection_carries_detail() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/verify/app_staging_123")
            .with_status(400)
            .with_body(
                r#"{"code": "max_verifications_reached", "detail": "This person has already verified for this action.", "attribute": null}"#,
            )
            .create_async()
            .await;

        let verifier = WorldIdCloudVerifier::new(
            server.url(),
            "app_staging_123",
            "login",
            Duration::from_secs(2),
        );

        match verifier.verify(&proof()).await {
            IdentityVerification::Rejected { reason } => {
                assert!(reason.contains("max_verifications_reached"));
            }
            IdentityVerification::Verified { .. } => panic!("Expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_verifier_rejects() {
        let result = UnconfiguredIdentityVerifier.verify(&proof()).await;
        assert!(matches!(result, IdentityVerification::Rejected { .. }));
    }
}
