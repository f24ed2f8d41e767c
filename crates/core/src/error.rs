//! Unified error types for the cardinality guard.
//!
//! Error codes:
//! - CONFIG_001-003: Configuration errors (fatal at startup)
//! - BACKEND_001: Errors surfaced by a wrapped backend

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    /// CONFIG_001: A limit value is out of range
    InvalidLimit,
    /// CONFIG_002: The clear-after duration is out of range
    InvalidDuration,
    /// CONFIG_003: The per-metric limit table could not be read
    MalformedOverrides,
}

impl ConfigErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidLimit => "CONFIG_001",
            Self::InvalidDuration => "CONFIG_002",
            Self::MalformedOverrides => "CONFIG_003",
        }
    }
}

/// Backend error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorCode {
    /// BACKEND_001: The backend failed to deliver
    SendFailed,
}

impl BackendErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SendFailed => "BACKEND_001",
        }
    }
}

/// Unified error type for the cardinality guard.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with code.
    #[error("[{code}] {message}")]
    Config { code: &'static str, message: String },

    /// Error reported by a backend.
    #[error("[{code}] backend {backend}: {message}")]
    Backend {
        code: &'static str,
        backend: String,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(code: ConfigErrorCode, msg: impl Into<String>) -> Self {
        Self::Config {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(code: BackendErrorCode, backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Backend {
            code: code.code(),
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Config { code, .. } => Some(code),
            Self::Backend { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the process should refuse to start on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
