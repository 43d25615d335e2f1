//! Error types for the mosaic-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Rejected input (empty password)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Password hashing failed
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Token signature, expiry or structure check failed
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token could not be produced
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
}
