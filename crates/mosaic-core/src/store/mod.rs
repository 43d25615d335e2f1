//! Persistence backends
//!
//! Every method is one atomic unit: either all of its row and counter changes
//! are applied or none are. Uniqueness of usernames, collection titles and
//! edge pairs is enforced here, not by callers.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::model::{
    Collection, FollowEdge, Image, NewCollection, NewImage, NewUser, Page, TagCount, User,
    UserChanges,
};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage for users, collections, images and their edges
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a user with zeroed counters; `DuplicateUsername` if taken
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Apply the supplied fields; `NotFound` or `DuplicateUsername`
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User>;

    /// Create the edge and bump both counters, or return the existing edge
    async fn follow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<FollowEdge>;

    /// Remove the edge and decrement both counters; false if there was no edge
    async fn unfollow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool>;

    async fn is_following_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool>;

    async fn follow_collection(&self, follower_id: Uuid, collection_id: Uuid)
        -> Result<FollowEdge>;

    async fn unfollow_collection(&self, follower_id: Uuid, collection_id: Uuid) -> Result<bool>;

    async fn is_following_collection(&self, follower_id: Uuid, collection_id: Uuid)
        -> Result<bool>;

    /// Insert a collection and bump the owner's `collection_count`;
    /// `DuplicateResource` if the title is taken
    async fn insert_collection(&self, collection: NewCollection) -> Result<Collection>;

    async fn collection_by_title(&self, title: &str) -> Result<Option<Collection>>;

    /// Newest first
    async fn list_collections(&self, offset: u64, limit: u64) -> Result<Page<Collection>>;

    async fn collections_by_owner(&self, owner_id: Uuid) -> Result<Vec<Collection>>;

    /// Images in a collection, newest first
    async fn collection_images(&self, collection_id: Uuid) -> Result<Vec<Image>>;

    /// Insert an image into the titled collection, creating the collection
    /// (owned by the uploader, thumbnail = image url) if it does not exist
    async fn attach_image(&self, image: NewImage, collection_title: &str)
        -> Result<(Image, Collection)>;

    async fn image_by_id(&self, id: Uuid) -> Result<Option<Image>>;

    /// Delete an image and its membership edges, decrementing `image_count`
    async fn delete_image(&self, id: Uuid) -> Result<Option<Image>>;

    /// Delete a collection with its edges and the images that belonged to
    /// it alone; returns the deleted images
    async fn delete_collection(&self, id: Uuid) -> Result<Vec<Image>>;

    /// Newest first
    async fn latest_images(&self, limit: u64) -> Result<Vec<Image>>;

    /// Images whose title, description or tags match every query term
    async fn search_images(&self, query: &str) -> Result<Vec<Image>>;

    /// Most used tags, most frequent first
    async fn popular_tags(&self, limit: u64) -> Result<Vec<TagCount>>;
}
