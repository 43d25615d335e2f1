//! # Mosaic Crypto
//!
//! Cryptographic building blocks for the Mosaic media service.
//!
//! This crate provides:
//! - **Password hashing**: Argon2id with random salts, PHC string format
//! - **Bearer tokens**: HS256 JWTs carrying a user identifier and a validity window
//! - **Content hashing**: BLAKE3 digests used to fingerprint uploaded media
//!
//! ## Example
//!
//! ```rust,ignore
//! use mosaic_crypto::{password, TokenService};
//!
//! let stored = password::hash("correct horse")?;
//! assert!(password::verify("correct horse", &stored));
//!
//! let tokens = TokenService::new(b"signing-secret");
//! let issued = tokens.issue(user_id)?;
//! let claims = tokens.verify(&issued.token)?;
//! assert_eq!(claims.id, user_id);
//! ```

pub mod error;
pub mod hashing;
pub mod password;
pub mod token;

pub use error::{CryptoError, Result};
pub use hashing::{content_hash, Blake3Hash};
pub use token::{Claims, IssuedToken, TokenService, DEFAULT_TOKEN_VALIDITY_HOURS};
