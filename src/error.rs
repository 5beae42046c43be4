use axum::{extract::multipart::MultipartError, http::StatusCode};
use thiserror::Error;

/// Failures a chat operation reports back to the caller without tearing down
/// the connection.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(&'static str),
    /// Unreadable or oversized upload body.
    #[error("{}", .0.body_text())]
    Upload(#[from] MultipartError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Upload(err) => err.status(),
            ChatError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to hand to a client. Storage errors collapse to `fallback`.
    pub fn client_message(&self, fallback: &str) -> String {
        match self {
            ChatError::Persistence(_) => fallback.to_owned(),
            other => other.to_string(),
        }
    }
}

/// Handshake-time failures. Any of these rejects the connection outright.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication error: No token provided")]
    MissingCredential,
    #[error("Authentication error: Invalid token payload")]
    Malformed,
    #[error("Authentication error: Invalid token")]
    InvalidSignature,
    #[error("Authentication error: Token expired")]
    Expired,
    #[error("Authentication error: User not found")]
    UnknownUser,
    #[error("Authentication error: User is inactive")]
    InactiveUser,
    #[error("Authentication error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}
