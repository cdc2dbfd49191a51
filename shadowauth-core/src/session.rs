use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{error::ShadowAuthError, SessionKey};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// The store that produced a session during verification. Computed at verify time, never
/// persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    /// The off-chain runtime.
    Runtime,
    /// The confidential session contract.
    Contract,
    /// The process-local fallback cache.
    Fallback,
}

/// A session as held by the fallback cache. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// The bearer credential, also the cache key.
    pub session_key: SessionKey,
    /// The relying application.
    pub app_id: String,
    /// Identity-proof nullifier. Kept for traceability only, never used for lookup.
    pub nullifier_hash: String,
    /// Creation time.
    pub created_at: u64,
    /// Expiry time, always after `created_at`.
    pub expires_at: u64,
    /// Cleared on revocation.
    pub is_valid: bool,
}

impl SessionRecord {
    /// Creates a valid session record.
    ///
    /// # Errors
    /// Returns [`ShadowAuthError::Internal`] if `expires_at` is not after `created_at`.
    pub fn new(
        session_key: SessionKey,
        app_id: impl Into<String>,
        nullifier_hash: impl Into<String>,
        created_at: u64,
        expires_at: u64,
    ) -> Result<Self, ShadowAuthError> {
        if expires_at <= created_at {
            return Err(ShadowAuthError::Internal(format!(
                "session expiry {expires_at} is not after creation {created_at}"
            )));
        }
        Ok(Self {
            session_key,
            app_id: app_id.into(),
            nullifier_hash: nullifier_hash.into(),
            created_at,
            expires_at,
            is_valid: true,
        })
    }

    /// Whether `now` is past the expiry time.
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// A session is verifiable iff it is valid and not expired.
    #[must_use]
    pub const fn is_verifiable(&self, now: u64) -> bool {
        self.is_valid && !self.is_expired(now)
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// The freshly issued session key.
    pub session_key: SessionKey,
    /// Expiry in unix milliseconds.
    pub valid_until: u64,
    /// Runtime transaction hash, if the runtime reported one.
    pub tx_hash: Option<String>,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSession {
    /// The application the session belongs to.
    pub app_id: String,
    /// Expiry in unix milliseconds, when the source reports one.
    pub valid_until: Option<u64>,
    /// The store that accepted the session.
    pub source: SessionSource,
}
