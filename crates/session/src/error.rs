use bullhorn_platform::PlatformError;
use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("login attempt timed out")]
    LoginTimeout,

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("credential io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
