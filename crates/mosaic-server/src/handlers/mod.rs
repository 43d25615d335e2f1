//! HTTP request handlers

pub mod auth;
pub mod clusters;
pub mod form;
pub mod media;
pub mod objects;
pub mod search;
pub mod service;
pub mod users;

pub use auth::*;
pub use clusters::*;
pub use media::*;
pub use objects::*;
pub use search::*;
pub use service::*;
pub use users::*;

use crate::AppState;
use serde::Serialize;

/// `{success, message}` acknowledgement body
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// `{id}` body returned by create-style endpoints
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: uuid::Uuid,
}

/// Delete blobs we stored ourselves; failures are only logged
pub(crate) async fn discard_blobs<'a>(state: &AppState, urls: impl IntoIterator<Item = &'a str>) {
    for url in urls {
        match state.media.remove_url(url).await {
            Ok(true) => tracing::debug!(url, "Removed blob"),
            Ok(false) => {}
            Err(e) => tracing::warn!(url, error = %e, "Failed to remove blob"),
        }
    }
}
