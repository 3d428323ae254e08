//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hookrelay_connectors::ConnectorError;
use hookrelay_core::CoreError;
use serde::Serialize;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

/// Error body. Every route answers failures as `{success: false, error}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_http_response(&self, request_id: Option<String>) -> (StatusCode, Json<ErrorResponse>) {
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            request_id,
        };
        (self.status(), Json(body))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.to_http_response(None).into_response()
    }
}

impl From<ConnectorError> for ServerError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Validation(msg) => ServerError::InvalidInput(msg),
            ConnectorError::Transport(_) | ConnectorError::Timeout(_) | ConnectorError::Callback(_) => {
                ServerError::Upstream(err.to_string())
            }
            ConnectorError::Credential(_) => ServerError::Forbidden(err.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => ServerError::NotFound(msg),
            CoreError::Invalid(msg) => ServerError::InvalidInput(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
