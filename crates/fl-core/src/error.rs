//! # AppError
//!
//! Centralized error handling for the Farmlog ecosystem.
//! Every engine operation terminates with one of these kinds; callers surface
//! the kind as an HTTP-equivalent status.

use thiserror::Error;

/// The primary error type for all fl-core and fl-services operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// No session, or the session points at an unknown user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking authority (USER role, non-owner STAFF, CSRF mismatch)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (e.g., farm record, file, thread, comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty content, disallowed MIME, cross-thread parent)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Write attempted on a locked thread by a non-admin
    #[error("locked: {0}")]
    Locked(String),

    /// Resource already exists (e.g., duplicate account email)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }
}

/// Port implementations report infrastructure failures through `anyhow`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Farmlog logic.
pub type Result<T> = std::result::Result<T, AppError>;
