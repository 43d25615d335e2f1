//! Records and views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub collection_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
}

/// An uploaded image
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub desc: Option<String>,
    /// Hex content hash of the uploaded bytes
    pub hash: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A named collection ("cluster") of images
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: Uuid,
    pub title: String,
    pub desc: String,
    pub thumbnail: Option<String>,
    pub owner_id: Uuid,
    pub image_count: i64,
    pub follower_count: i64,
    pub created_at: DateTime<Utc>,
}

/// User to user follow edge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// User to collection follow edge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CollectionFollow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub collection_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Image membership in a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, sqlx::FromRow)]
pub struct ImageCollection {
    pub image_id: Uuid,
    pub collection_id: Uuid,
}

/// Result of a follow request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowEdge {
    pub id: Uuid,
    /// False when the edge already existed
    pub created: bool,
}

/// Fields for a new user row
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

/// Fields for a new image row
#[derive(Clone, Debug)]
pub struct NewImage {
    pub url: String,
    pub title: String,
    pub desc: Option<String>,
    pub hash: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: Uuid,
}

/// Fields for a new collection row
#[derive(Clone, Debug)]
pub struct NewCollection {
    pub title: String,
    pub desc: String,
    pub thumbnail: Option<String>,
    pub owner_id: Uuid,
}

/// Profile changes requested by a user; `None` leaves a field untouched
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Profile changes as stored, password already hashed
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.password_hash.is_none()
            && self.bio.is_none()
            && self.avatar.is_none()
    }
}

/// Identity carried by a valid token
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&User> for UserSession {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Public view of a user
#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub collection_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub is_owner: bool,
    pub is_following: bool,
}

impl Profile {
    pub fn new(user: User, is_owner: bool, is_following: bool) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            avatar: user.avatar,
            bio: user.bio,
            collection_count: user.collection_count,
            follower_count: user.follower_count,
            following_count: user.following_count,
            created_at: user.created_at,
            is_owner,
            is_following,
        }
    }
}

/// A collection as seen by a (possibly anonymous) viewer
#[derive(Clone, Debug, Serialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub owner_username: String,
    pub is_owner: bool,
    pub is_following: bool,
}

/// One page of a listing plus the total number of records
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
}

/// A tag and how many images carry it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}
