use thiserror::Error;

/// Error outputs from `ShadowAuth`.
#[derive(Debug, Error)]
pub enum ShadowAuthError {
    /// A required field is missing or malformed.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    /// The proof or the session was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The runtime or the contract could not be reached.
    ///
    /// Store clients convert this into negative results. It only escapes when a caller uses
    /// the raw HTTP helpers.
    #[error("upstream_unavailable: {url} ({status:?}): {error}")]
    UpstreamUnavailable {
        /// URL of the failed request.
        url: String,
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Error message.
        error: String,
    },
    /// Unexpected error serializing or deserializing data.
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// The configuration is not usable.
    #[error("invalid configuration for {attribute}: {reason}")]
    Configuration {
        /// The setting at fault.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The operating system entropy source failed. Sessions cannot be issued safely.
    #[error("entropy_unavailable: {0}")]
    Entropy(String),
    /// Unexpected internal failure.
    #[error("internal_error: {0}")]
    Internal(String),
}

/// Coarse classification of [`ShadowAuthError`] used by the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 400
    InvalidRequest,
    /// 401
    Unauthorized,
    /// 500
    Internal,
}

impl ErrorClass {
    /// HTTP status code for the class.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }
}

impl ShadowAuthError {
    /// Returns the error class the caller should see.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Self::Unauthorized(_) => ErrorClass::Unauthorized,
            Self::UpstreamUnavailable { .. }
            | Self::Serialization(_)
            | Self::Configuration { .. }
            | Self::Entropy(_)
            | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Message safe to return to a caller. Internal details are never exposed.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest(reason) | Self::Unauthorized(reason) => reason.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<serde_json::Error> for ShadowAuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
