use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use profilehub_core::ProfileHubError;
use serde_json::json;
use std::time::Duration;
use tracing::error;

/// Error returned by every handler. Rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// No credential, or an unknown one.
    Unauthorized(&'static str),
    /// Valid credential without the required role.
    Forbidden(&'static str),
    /// Malformed request.
    BadRequest(String),
    /// Caller exhausted its rate-limit bucket.
    TooManyRequests {
        /// Time until the bucket admits another request.
        retry_after: Duration,
    },
    /// A collaborator the endpoint needs is not configured.
    NotConfigured(&'static str),
    /// Any error from the library crates.
    Core(ProfileHubError),
}

impl ApiError {
    /// Status code and caller-visible message.
    fn parts(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, (*msg).to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, (*msg).to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::TooManyRequests { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            ApiError::NotConfigured(what) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{what} is not configured"),
            ),
            ApiError::Core(err) => match err {
                ProfileHubError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ProfileHubError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                ProfileHubError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    "A profile with this email already exists".to_string(),
                ),
                ProfileHubError::Upstream { status, message } => (
                    StatusCode::BAD_GATEWAY,
                    format!("Upstream service error: {status} {message}"),
                ),
                ProfileHubError::Timeout(_) => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "The request timed out".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
        }
    }
}

impl From<ProfileHubError> for ApiError {
    fn from(err: ProfileHubError) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        if status.is_server_error() {
            match &self {
                ApiError::Core(err) => error!(status = status.as_u16(), error = %err, "Request failed"),
                _ => error!(status = status.as_u16(), error = %message, "Request failed"),
            }
        }
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let ApiError::TooManyRequests { retry_after } = self {
            // Whole seconds, rounded up, at least one.
            let partial = u64::from(retry_after.subsec_nanos() > 0);
            let secs = retry_after.as_secs().saturating_add(partial).max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
