//! API error type and its JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::error::{ExtractError, LlmError, MailError, SourceError, StoreError};

/// Every handler failure. Renders as
/// `{"success": false, "error": "...", "retryable": bool}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// A dependency (Slack, Outlook, the LLM, mail) failed; try again later.
    #[error("{0}")]
    Upstream(String),

    /// A dependency is not configured on this server.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "retryable": self.retryable(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound("Channel not found".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotConfigured(what) => Self::Unavailable(format!("{what} is not configured")),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::InvalidAddress { .. } => Self::Validation(e.to_string()),
            MailError::NotConfigured => Self::Unavailable(e.to_string()),
            MailError::SendFailed { .. } => Self::Upstream(e.to_string()),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_retryable_mapping() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        let upstream = ApiError::from(LlmError::RateLimited {
            provider: "together".into(),
        });
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert!(upstream.retryable());
        assert!(!ApiError::Internal("x".into()).retryable());
    }

    #[test]
    fn store_not_found_becomes_404() {
        let err = ApiError::from(StoreError::NotFound("9".into()));
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn unconfigured_source_is_unavailable() {
        let err = ApiError::from(SourceError::NotConfigured("SLACK_USER_TOKEN".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.retryable());
    }
}
