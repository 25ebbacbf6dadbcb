// src/error.rs
use thiserror::Error;

/// Errors returned across every component in the core. Variant names are the
/// error *kinds*, not wrappers around a particular library's exception type,
/// except where noted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URI error: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("insufficient points: have {have}, need {need}")]
    InsufficientPoints { have: i64, need: i64 },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Coarse kind label, for logging/metrics without the message payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::Http(_) => "http",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
            Error::InvalidUri(_) => "invalid_uri",
            Error::NotFound(_) => "not_found",
            Error::PermissionDenied(_) => "permission_denied",
            Error::PreconditionFailed(_) => "precondition_failed",
            Error::InsufficientPoints { .. } => "insufficient_points",
            Error::AlreadyExists(_) => "already_exists",
            Error::TokenRefreshFailed(_) => "token_refresh_failed",
            Error::TransportError(_) => "transport_error",
            Error::Encryption(_) => "encryption",
            Error::Decryption(_) => "decryption",
            Error::KeyDerivation(_) => "key_derivation",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Internal(err.to_string())
    }
}
