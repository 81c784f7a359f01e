//! Error types for remo.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for process-level remo operations.
#[derive(Error, Debug)]
pub enum RemoError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session signing key is unusable.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// Password hashing failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Command-line arguments could not be parsed.
    #[error("invalid arguments: {0}")]
    Cli(String),

    /// HTTP server failure.
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience Result type for remo operations.
pub type Result<T> = std::result::Result<T, RemoError>;

/// Why a caller was refused.
///
/// Every denial is terminal for the current request only; none of them is
/// fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Wrong identity or credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller exceeded its call-rate window.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Missing, expired or tampered session token.
    #[error("session invalid")]
    SessionInvalid,

    /// Anti-forgery token absent or not matching the session.
    #[error("csrf token mismatch")]
    CsrfMismatch,

    /// The downstream action layer failed.
    #[error("action failed: {0}")]
    CollaboratorFailure(String),
}

impl Denial {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::SessionInvalid => "SESSION_INVALID",
            Self::CsrfMismatch => "CSRF_MISMATCH",
            Self::CollaboratorFailure(_) => "ACTION_FAILED",
        }
    }
}
