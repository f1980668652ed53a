use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bullhorn_broadcast::BroadcastError;
use bullhorn_session::SessionError;
use bullhorn_store::StoreError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        error!(error = ?error, "session error");
        let status = match error {
            SessionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            SessionError::LoginTimeout => StatusCode::GATEWAY_TIMEOUT,
            SessionError::Platform(_) | SessionError::Io(_) | SessionError::Serialize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        error!(error = ?error, "store error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl From<BroadcastError> for ApiError {
    fn from(error: BroadcastError) -> Self {
        error!(error = ?error, "broadcast error");
        let status = match error {
            BroadcastError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            BroadcastError::TemplateNotFound { .. } => StatusCode::NOT_FOUND,
            BroadcastError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}
