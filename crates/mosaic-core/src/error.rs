//! Error types for the mosaic-core crate

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in catalog operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Username already taken
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// A uniquely named resource already exists
    #[error("{kind} already exists: {name}")]
    DuplicateResource { kind: &'static str, name: String },

    /// No user with that username
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Password did not match
    #[error("invalid password")]
    InvalidPassword,

    /// Token failed verification or its user no longer exists
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Requester may not perform the operation
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Record not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Follow edge did not exist
    #[error("not following {0}")]
    EdgeNotFound(String),

    /// Crypto error
    #[error("crypto error: {0}")]
    Crypto(#[from] mosaic_crypto::CryptoError),

    /// Database error
    #[error("database error: {0}")]
    Database(String),
}

impl CoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateResource {
            kind,
            name: name.into(),
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}
