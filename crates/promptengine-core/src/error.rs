use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by every request-issuing operation
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the session token. The session has already been
    /// invalidated by the time this is returned.
    #[error("session expired or unauthorized")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// 2xx response whose body flags an error (`{"error": true, "message": ...}`)
    #[error("{0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Short text for the error banners shown in every view
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            ApiError::InvalidCredentials => {
                "Login failed. Please check your credentials.".to_string()
            }
            ApiError::Status { status, message } if message.is_empty() => {
                format!("Server error ({})", status.as_u16())
            }
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Rejected(message) => message.clone(),
            ApiError::Transport(_) => "Could not reach the server.".to_string(),
            ApiError::Decode(_) => "The server sent an unexpected response.".to_string(),
            ApiError::Storage(e) => format!("Could not access local storage: {}", e),
            ApiError::Validation(message) => message.clone(),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}
