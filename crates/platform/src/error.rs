use thiserror::Error;

/// Result type alias for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors surfaced by a platform connector or handle.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("bridge unreachable: {0}")]
    BridgeUnavailable(String),

    #[error("bridge rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("invalid bridge response: {0}")]
    InvalidResponse(String),

    #[error("send to {recipient_id} failed: {message}")]
    SendFailed {
        recipient_id: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    pub fn send_failed(recipient_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SendFailed {
            recipient_id: recipient_id.into(),
            message: message.into(),
        }
    }
}
