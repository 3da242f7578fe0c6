use thiserror::Error;

/// Top-level error type shared across the Escriba workspace.
#[derive(Debug, Error)]
pub enum EscribaError {
    #[error("store error: {0}")]
    Store(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias for Escriba operations.
pub type Result<T> = std::result::Result<T, EscribaError>;
