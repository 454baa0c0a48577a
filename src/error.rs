#![forbid(unsafe_code)]

//! JSON error responses shared by every handler and platform module.
//!
//! Failures are carried as a status code plus a human-readable message and
//! rendered as `{"success": false, "error": ...}`, matching what callers of
//! the original service already parse.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::config::RunMode;

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    // Marks messages carrying internal detail (library error text, setup
    // failures). Deliberate upstream pass-through messages stay readable
    // in production; these do not.
    internal: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            internal: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            internal: true,
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Carries an upstream HTTP status through unchanged, falling back to
    /// 502 when the upstream code is not a valid client/server error.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status)
            .ok()
            .filter(|code| code.is_client_error() || code.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replaces internal detail with a generic message in production.
    /// Client errors and deliberate upstream pass-through messages keep
    /// their text; only errors flagged as internal are rewritten.
    pub fn redacted(self, mode: RunMode) -> Self {
        if mode.is_production() && self.internal {
            Self {
                message: "Internal server error".to_string(),
                ..self
            }
        } else {
            self
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Upstream request timed out: {err}")
        } else if err.is_decode() {
            format!("Upstream returned malformed data: {err}")
        } else {
            format!("Upstream request failed: {err}")
        };
        // Library error text, not something we wrote for callers.
        Self {
            internal: true,
            ..Self::bad_gateway(message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::json!({
            "success": false,
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_keeps_known_error_codes() {
        assert_eq!(
            ApiError::upstream(404, "gone").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::upstream(503, "down").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn upstream_maps_success_codes_to_bad_gateway() {
        assert_eq!(
            ApiError::upstream(200, "odd").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::upstream(0, "junk").status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn redaction_hides_internal_detail_in_production() {
        let err = ApiError::internal("db exploded").redacted(RunMode::Production);
        assert_eq!(err.message(), "Internal server error");

        let err = ApiError::internal("db exploded").redacted(RunMode::Development);
        assert_eq!(err.message(), "db exploded");

        let err = ApiError::bad_request("missing url").redacted(RunMode::Production);
        assert_eq!(err.message(), "missing url");
    }

    #[test]
    fn redaction_keeps_deliberate_upstream_messages() {
        let err = ApiError::unavailable("Facebook video service temporarily unavailable")
            .redacted(RunMode::Production);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            err.message(),
            "Facebook video service temporarily unavailable"
        );

        let err = ApiError::bad_gateway("All TikTok download methods failed")
            .redacted(RunMode::Production);
        assert_eq!(err.message(), "All TikTok download methods failed");

        let err = ApiError::upstream(502, "oEmbed responded with status 502")
            .redacted(RunMode::Production);
        assert_eq!(err.message(), "oEmbed responded with status 502");
    }
}
