//! Password hashing with Argon2id
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$...`) so the salt and
//! work factor travel with the digest.

use crate::{CryptoError, Result};
use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

/// Hash a password with a fresh random salt
pub fn hash(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput("password cannot be empty".to_string()));
    }

    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?
        .to_string();

    Ok(hash)
}

/// Check a password against a stored PHC string.
///
/// Unparsable hashes verify as `false`.
pub fn verify(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
