use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shadowauth_core::{ErrorClass, ShadowAuthError};
use tracing::{debug, error};

/// A [`ShadowAuthError`] rendered as `{success: false, error}` with the matching status.
///
/// Internal failures are logged in full and answered with a generic message.
#[derive(Debug)]
pub struct ApiError(pub ShadowAuthError);

impl From<ShadowAuthError> for ApiError {
    fn from(error: ShadowAuthError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ShadowAuthError::InvalidRequest(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.0.class();
        let status = match class {
            ErrorClass::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if class == ErrorClass::Internal {
            error!(error = %self.0, "request failed");
        } else {
            debug!(error = %self.0, "request rejected");
        }

        let body = json!({
            "success": false,
            "error": self.0.public_message(),
        });
        (status, Json(body)).into_response()
    }
}
