//! # Mosaic Core
//!
//! Data model and bookkeeping for the Mosaic media service.
//!
//! This crate provides:
//! - **Model**: users, images, collections and the edges between them
//! - **Store**: atomic persistence units with in-memory and PostgreSQL backends
//! - **Catalog**: validation, credentials, tokens and ownership checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Request Handlers            │
//! ├─────────────────────────────────────────┤
//! │                 Catalog                 │
//! ├─────────────────────────────────────────┤
//! │               Store Trait               │
//! ├────────────────────┬────────────────────┤
//! │    MemoryStore     │      PgStore       │
//! └────────────────────┴────────────────────┘
//! ```

pub mod catalog;
pub mod error;
pub mod model;
pub mod store;

pub use catalog::{Catalog, ImageUpload, Signup};
pub use error::{CoreError, Result};
pub use model::{
    Collection, CollectionFollow, CollectionView, Follow, FollowEdge, Image, ImageCollection,
    Page, Profile, TagCount, User, UserSession, UserUpdate,
};
pub use store::{MemoryStore, PgStore, Store};
