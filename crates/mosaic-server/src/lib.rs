//! # Mosaic Server
//!
//! JSON/multipart HTTP API for the Mosaic media sharing service.
//!
//! ## Endpoints
//!
//! - `POST /auth`, `POST /auth/validate` - bearer tokens
//! - `/users/...` - signup, profile updates, profiles and follows
//! - `/clusters/...` - collections, their images and followers
//! - `/media/...`, `/search` - uploads, feed, lookup, tags and search
//! - `GET /objects/{bucket}/{*key}` - blobs held by the local backends
//!
//! Every failure uses one envelope:
//! `{"success": false, "code": "...", "message": "...", "request_id": "..."}`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ObjectStoreKind, ServerConfig};
pub use error::{ApiError, ErrorCode};
pub use routes::create_router;
pub use server::{run_server, shutdown_signal};
pub use state::AppState;
