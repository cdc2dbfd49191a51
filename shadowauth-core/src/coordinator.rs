use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    analytics::{
        AnalyticsDispatcher, EVENT_SESSION_CREATED, EVENT_SESSION_REVOKED, EVENT_SESSION_VERIFIED,
    },
    cache::SessionCache,
    config::ShadowAuthConfig,
    contract::ContractSessionClient,
    error::ShadowAuthError,
    identity::{IdentityProofVerifier, IdentityVerification, ZkProof},
    runtime::{ProofVerification, ProofVerificationRequest, RuntimeVerifier, SessionCheckRequest},
    utils::{now_millis, redact},
    LoginOutcome, SessionKey, SessionRecord, SessionSource, VerifiedSession,
};

const INVALID_SESSION: &str = "Invalid or expired session";
const OFF_CHAIN_REJECTED: &str = "Off-chain verification failed";

/// Orchestrates login, verification and revocation across the runtime, the contract and the
/// fallback cache.
///
/// Writes are best-effort and not transactional; a session may be present in any subset of
/// the stores. Verification queries them in the fixed order runtime, contract, fallback and
/// accepts the first valid answer.
pub struct SessionCoordinator {
    runtime: Arc<dyn RuntimeVerifier>,
    identity: Arc<dyn IdentityProofVerifier>,
    contract: ContractSessionClient,
    cache: Arc<dyn SessionCache>,
    analytics: AnalyticsDispatcher,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("runtime", &self.runtime.mode())
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    /// Assembles a coordinator from its collaborators.
    #[must_use]
    pub fn new(
        runtime: Arc<dyn RuntimeVerifier>,
        identity: Arc<dyn IdentityProofVerifier>,
        contract: ContractSessionClient,
        cache: Arc<dyn SessionCache>,
        analytics: AnalyticsDispatcher,
    ) -> Self {
        Self {
            runtime,
            identity,
            contract,
            cache,
            analytics,
        }
    }

    /// Builds every collaborator from `config` and spawns the analytics worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`ShadowAuthError::Configuration`] if `config` does not validate.
    pub fn from_config(
        config: &ShadowAuthConfig,
        cache: Arc<dyn SessionCache>,
    ) -> Result<(Self, JoinHandle<()>), ShadowAuthError> {
        config.validate()?;
        let runtime = config.build_runtime();
        let (analytics, worker) =
            AnalyticsDispatcher::spawn(runtime.clone(), config.analytics_capacity);
        let coordinator = Self::new(
            runtime,
            config.build_identity_verifier(),
            config.build_contract_client(),
            cache,
            analytics,
        );
        Ok((coordinator, worker))
    }

    /// The runtime client, for health polling.
    #[must_use]
    pub fn runtime(&self) -> Arc<dyn RuntimeVerifier> {
        self.runtime.clone()
    }

    /// Issues a session for a verified human.
    ///
    /// # Errors
    /// - [`ShadowAuthError::InvalidRequest`] if `app_id` or proof material is missing.
    /// - [`ShadowAuthError::Unauthorized`] if the identity service or the runtime rejects the
    ///   proof.
    /// - [`ShadowAuthError::Entropy`] or [`ShadowAuthError::Internal`] if no session could be
    ///   generated.
    pub async fn login(
        &self,
        app_id: &str,
        proof: &ZkProof,
    ) -> Result<LoginOutcome, ShadowAuthError> {
        if app_id.is_empty() || !proof.is_complete() {
            return Err(ShadowAuthError::InvalidRequest(
                "Missing appId or zkProof".to_string(),
            ));
        }

        let nullifier_hash = match self.identity.verify(proof).await {
            IdentityVerification::Verified { nullifier_hash } => nullifier_hash,
            IdentityVerification::Rejected { reason } => {
                info!(%app_id, %reason, "login: identity proof rejected");
                return Err(ShadowAuthError::Unauthorized("Invalid ZK proof".to_string()));
            }
        };

        let request = ProofVerificationRequest {
            app_id: app_id.to_string(),
            nullifier_hash: nullifier_hash.clone(),
            merkle_root: proof.merkle_root.clone(),
            proof: proof.proof.clone(),
            verification_level: proof.verification_level,
            signal: proof.signal.clone(),
        };
        let (session_key, valid_until, tx_hash) =
            match self.runtime.verify_proof(&request).await? {
                ProofVerification::Accepted {
                    session_key,
                    valid_until,
                    tx_hash,
                } => (session_key, valid_until, tx_hash),
                ProofVerification::Rejected { error } => {
                    // The runtime's reason can carry transport detail; it stays in the log.
                    warn!(%app_id, %error, "login: runtime rejected proof");
                    return Err(ShadowAuthError::Unauthorized(
                        OFF_CHAIN_REJECTED.to_string(),
                    ));
                }
            };

        let record = SessionRecord::new(
            session_key,
            app_id,
            nullifier_hash.as_str(),
            now_millis(),
            valid_until,
        )?;
        let (stored_on_contract, ()) = tokio::join!(
            self.contract
                .create_session(app_id, &session_key, valid_until, &nullifier_hash),
            self.cache.put(record),
        );
        if !stored_on_contract {
            warn!(%app_id, "login: contract write failed, continuing with remaining stores");
        }

        self.analytics.dispatch(
            app_id,
            EVENT_SESSION_CREATED,
            Some(json!({
                "verification_level": proof.verification_level,
                "timestamp": now_millis(),
            })),
        );
        info!(
            %app_id,
            session_key = %redact(&session_key.to_hex()),
            nullifier_hash = %redact(&nullifier_hash),
            valid_until,
            "login: session issued"
        );

        Ok(LoginOutcome {
            session_key,
            valid_until,
            tx_hash,
        })
    }

    /// Verifies a session key, optionally for a specific application.
    ///
    /// # Errors
    /// - [`ShadowAuthError::InvalidRequest`] if `session_key` is empty.
    /// - [`ShadowAuthError::Unauthorized`] if no store holds a valid session for it, including
    ///   when the key is malformed.
    pub async fn verify(
        &self,
        session_key: &str,
        app_id: Option<&str>,
    ) -> Result<VerifiedSession, ShadowAuthError> {
        let key = parse_session_key(session_key)?;
        let app_id = app_id.filter(|app_id| !app_id.is_empty());

        let verified = self.lookup(&key, app_id).await.ok_or_else(|| {
            debug!(session_key = %redact(session_key), "verify: no store accepted the session");
            ShadowAuthError::Unauthorized(INVALID_SESSION.to_string())
        })?;

        self.analytics.dispatch(
            &verified.app_id,
            EVENT_SESSION_VERIFIED,
            Some(json!({
                "source": verified.source,
                "timestamp": now_millis(),
            })),
        );
        info!(
            app_id = %verified.app_id,
            source = %verified.source,
            session_key = %redact(session_key),
            "verify: session accepted"
        );
        Ok(verified)
    }

    async fn lookup(&self, key: &SessionKey, app_id: Option<&str>) -> Option<VerifiedSession> {
        let now = now_millis();

        let runtime = self
            .runtime
            .verify_session(&SessionCheckRequest {
                session_key: key.to_hex(),
                app_id: app_id.unwrap_or_default().to_string(),
                timestamp: now,
            })
            .await;
        if let Some(accepted) = runtime.accepted_app_id() {
            return Some(VerifiedSession {
                app_id: accepted.to_string(),
                valid_until: runtime.valid_until,
                source: SessionSource::Runtime,
            });
        }
        if let Some(error) = &runtime.error {
            debug!(%error, "verify: runtime did not confirm session");
        }

        let contract = self.contract.verify_session(key).await;
        if let Some(accepted) = contract.accepted_app_id() {
            return Some(VerifiedSession {
                app_id: accepted.to_string(),
                valid_until: Some(contract.valid_until),
                source: SessionSource::Contract,
            });
        }

        // `get` drops the record if it has expired.
        let record = self.cache.get(key).await?;
        if !record.is_verifiable(now) {
            return None;
        }
        if app_id.is_some_and(|expected| expected != record.app_id) {
            debug!(
                session_key = %redact(&key.to_hex()),
                "verify: fallback record belongs to another application"
            );
            return None;
        }
        Some(VerifiedSession {
            app_id: record.app_id,
            valid_until: Some(record.expires_at),
            source: SessionSource::Fallback,
        })
    }

    /// Revokes a session on the contract and in the fallback cache.
    ///
    /// The runtime has no revocation endpoint; sessions it tracks expire naturally.
    ///
    /// # Errors
    /// - [`ShadowAuthError::InvalidRequest`] if `session_key` is empty.
    /// - [`ShadowAuthError::Unauthorized`] if the key is malformed or no store acknowledged the
    ///   revocation.
    pub async fn revoke(&self, session_key: &str) -> Result<(), ShadowAuthError> {
        let key = parse_session_key(session_key)?;

        // A disabled contract reports success without sending anything; it does not count.
        let revoked_on_contract = self.contract.revoke_session(&key).await
            && self.contract.writes_enabled();
        let app_id = self.cache.get(&key).await.map(|record| record.app_id);
        let invalidated = self.cache.invalidate(&key).await;

        if !revoked_on_contract && !invalidated {
            return Err(ShadowAuthError::Unauthorized(INVALID_SESSION.to_string()));
        }

        let app_id = app_id.unwrap_or_default();
        self.analytics.dispatch(
            &app_id,
            EVENT_SESSION_REVOKED,
            Some(json!({ "timestamp": now_millis() })),
        );
        info!(
            %app_id,
            session_key = %redact(session_key),
            revoked_on_contract,
            invalidated,
            "revoke: session revoked"
        );
        Ok(())
    }

    /// Removes expired records from the fallback cache. Returns the count removed.
    pub async fn purge_expired_sessions(&self) -> usize {
        let purged = self.cache.purge_expired(now_millis()).await;
        if purged > 0 {
            debug!(purged, "fallback cache: expired sessions purged");
        }
        purged
    }
}

/// Empty keys are missing input. Anything that does not parse is an unknown session.
fn parse_session_key(session_key: &str) -> Result<SessionKey, ShadowAuthError> {
    let session_key = session_key.trim();
    if session_key.is_empty() {
        return Err(ShadowAuthError::InvalidRequest(
            "Session key required".to_string(),
        ));
    }
    session_key
        .parse()
        .map_err(|_| ShadowAuthError::Unauthorized(INVALID_SESSION.to_string()))
}
