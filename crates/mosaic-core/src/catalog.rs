//! Catalog service
//!
//! Validation, credential handling and authorization in front of a [`Store`].
//! Handlers talk to this type only; it never touches object storage.

use crate::model::{
    Collection, CollectionView, FollowEdge, Image, NewCollection, NewImage, NewUser, Page,
    Profile, TagCount, User, UserChanges, UserSession, UserUpdate,
};
use crate::store::Store;
use crate::{CoreError, Result};
use mosaic_crypto::{password, Claims, IssuedToken, TokenService};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 32;
/// Longest accepted display name, title or password
pub const MAX_TEXT_LEN: usize = 128;
/// Most tags kept per image
pub const MAX_TAGS: usize = 20;
/// Largest page size for listings
pub const MAX_PAGE_LIMIT: u64 = 100;
/// Largest feed size
pub const MAX_FEED_LIMIT: u64 = 500;

/// Usernames that collide with route segments
const RESERVED_USERNAMES: &[&str] = &["me"];

/// Signup form
#[derive(Clone, Debug, Deserialize)]
pub struct Signup {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Metadata for an image whose bytes are already stored
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub url: String,
    pub title: String,
    pub desc: Option<String>,
    pub hash: Option<String>,
    pub tags: Vec<String>,
    pub collection: String,
}

/// Front door to users, collections and images
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
    tokens: TokenService,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(CoreError::Validation(format!(
            "username must be 1 to {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CoreError::Validation(
            "username must only contain letters, numbers, and underscores".to_string(),
        ));
    }
    if RESERVED_USERNAMES.contains(&username) {
        return Err(CoreError::Validation(format!(
            "username '{}' is reserved",
            username
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(CoreError::Validation("password is required".to_string()));
    }
    if password.len() > MAX_TEXT_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at most {} characters",
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}

/// Trimmed, non-empty, bounded text
fn required_text(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(CoreError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim tags, drop blanks and duplicates, keep first-seen order
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(CoreError::Validation(format!(
            "at most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(normalized)
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a user with zeroed counters
    #[instrument(skip(self, signup), fields(username = %signup.username))]
    pub async fn create_user(&self, signup: Signup) -> Result<User> {
        validate_username(&signup.username)?;
        validate_password(&signup.password)?;
        let name = required_text("name", &signup.name)?;

        let password_hash = password::hash(&signup.password)?;
        let user = self
            .store
            .insert_user(NewUser {
                name,
                username: signup.username,
                password_hash,
                avatar: optional_text(signup.avatar),
                bio: optional_text(signup.bio),
            })
            .await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Check credentials and issue a bearer token
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<IssuedToken> {
        let user = self
            .store
            .user_by_username(username)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(username.to_string()))?;

        if !password::verify(password, &user.password_hash) {
            debug!("Password mismatch");
            return Err(CoreError::InvalidPassword);
        }

        Ok(self.tokens.issue(user.id)?)
    }

    /// Signature and expiry check only
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.tokens
            .verify(token)
            .map_err(|e| CoreError::InvalidToken(e.to_string()))
    }

    /// Session for a token; `InvalidToken` if the token or its user is gone
    pub async fn resolve_token(&self, token: &str) -> Result<UserSession> {
        match self.resolve_user(token).await {
            Ok(user) => Ok(UserSession::from(&user)),
            Err(CoreError::Unauthorized(reason)) => Err(CoreError::InvalidToken(reason)),
            Err(e) => Err(e),
        }
    }

    /// User for a token; `Unauthorized` if the user no longer exists
    pub async fn resolve_user(&self, token: &str) -> Result<User> {
        let claims = self.verify_token(token)?;
        self.store
            .user_by_id(claims.id)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("user no longer exists".to_string()))
    }

    pub async fn user(&self, id: Uuid) -> Result<User> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id))
    }

    async fn user_named(&self, username: &str) -> Result<User> {
        self.store
            .user_by_username(username)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(username.to_string()))
    }

    async fn collection_titled(&self, title: &str) -> Result<Collection> {
        self.store
            .collection_by_title(title)
            .await?
            .ok_or_else(|| CoreError::not_found("collection", title))
    }

    /// Follow a user; following twice returns the existing edge
    #[instrument(skip(self))]
    pub async fn follow(&self, target_username: &str, follower_id: Uuid) -> Result<FollowEdge> {
        let target = self.user_named(target_username).await?;
        if target.id == follower_id {
            return Err(CoreError::Validation("cannot follow yourself".to_string()));
        }
        self.store.follow_user(follower_id, target.id).await
    }

    #[instrument(skip(self))]
    pub async fn unfollow(&self, target_username: &str, follower_id: Uuid) -> Result<()> {
        let target = self.user_named(target_username).await?;
        if !self.store.unfollow_user(follower_id, target.id).await? {
            return Err(CoreError::EdgeNotFound(target_username.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn follow_collection(&self, title: &str, user_id: Uuid) -> Result<FollowEdge> {
        let collection = self.collection_titled(title).await?;
        self.store.follow_collection(user_id, collection.id).await
    }

    #[instrument(skip(self))]
    pub async fn unfollow_collection(&self, title: &str, user_id: Uuid) -> Result<()> {
        let collection = self.collection_titled(title).await?;
        if !self
            .store
            .unfollow_collection(user_id, collection.id)
            .await?
        {
            return Err(CoreError::EdgeNotFound(title.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, desc, thumbnail))]
    pub async fn create_collection(
        &self,
        title: &str,
        desc: Option<String>,
        thumbnail: Option<String>,
        owner_id: Uuid,
    ) -> Result<Collection> {
        let title = required_text("title", title)?;
        self.user(owner_id).await?;

        let collection = self
            .store
            .insert_collection(NewCollection {
                title,
                desc: optional_text(desc).unwrap_or_default(),
                thumbnail,
                owner_id,
            })
            .await?;

        info!(collection_id = %collection.id, "Collection created");
        Ok(collection)
    }

    /// Record an uploaded image inside the titled collection, creating the
    /// collection on first use
    #[instrument(skip(self, upload), fields(collection = %upload.collection))]
    pub async fn upload_image(&self, upload: ImageUpload, owner_id: Uuid) -> Result<Image> {
        if upload.url.trim().is_empty() {
            return Err(CoreError::Validation("image url is required".to_string()));
        }
        let title = required_text("title", &upload.title)?;
        let collection = required_text("collection", &upload.collection)?;
        let tags = normalize_tags(upload.tags)?;
        self.user(owner_id).await?;

        let (image, collection) = self
            .store
            .attach_image(
                NewImage {
                    url: upload.url,
                    title,
                    desc: optional_text(upload.desc),
                    hash: upload.hash,
                    tags,
                    owner_id,
                },
                &collection,
            )
            .await?;

        info!(
            image_id = %image.id,
            collection_id = %collection.id,
            image_count = collection.image_count,
            "Image uploaded"
        );
        Ok(image)
    }

    /// Delete an image owned by the requester
    #[instrument(skip(self))]
    pub async fn delete_image(&self, image_id: Uuid, requester_id: Uuid) -> Result<Image> {
        let image = self.image(image_id).await?;
        if image.owner_id != requester_id {
            warn!(owner_id = %image.owner_id, "Delete refused: not the owner");
            return Err(CoreError::Unauthorized(
                "only the owner can delete this image".to_string(),
            ));
        }

        self.store
            .delete_image(image_id)
            .await?
            .ok_or_else(|| CoreError::not_found("image", image_id))
    }

    /// Delete a collection owned by the requester; returns the images that
    /// were removed with it
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, title: &str, requester_id: Uuid) -> Result<Vec<Image>> {
        let collection = self.collection_titled(title).await?;
        if collection.owner_id != requester_id {
            warn!(owner_id = %collection.owner_id, "Delete refused: not the owner");
            return Err(CoreError::Unauthorized(
                "only the owner can delete this collection".to_string(),
            ));
        }

        let removed = self.store.delete_collection(collection.id).await?;
        info!(removed = removed.len(), "Collection deleted");
        Ok(removed)
    }

    /// Apply profile changes; only the user themself may update
    #[instrument(skip(self, update))]
    pub async fn update_user(
        &self,
        requester_id: Uuid,
        user_id: Uuid,
        update: UserUpdate,
    ) -> Result<User> {
        let current = self.user(user_id).await?;
        if requester_id != user_id {
            return Err(CoreError::Unauthorized(
                "cannot update another user".to_string(),
            ));
        }

        let mut changes = UserChanges::default();
        if let Some(name) = update.name {
            changes.name = Some(required_text("name", &name)?);
        }
        if let Some(username) = update.username {
            validate_username(&username)?;
            if username != current.username {
                changes.username = Some(username);
            }
        }
        if let Some(password) = update.password {
            validate_password(&password)?;
            changes.password_hash = Some(password::hash(&password)?);
        }
        changes.bio = update.bio.map(|b| b.trim().to_string());
        changes.avatar = optional_text(update.avatar);

        if changes.is_empty() {
            return Ok(current);
        }
        self.store.update_user(user_id, changes).await
    }

    /// One page of collections, newest first; pages start at 1
    pub async fn list_clusters(&self, page: u64, limit: u64) -> Result<Page<Collection>> {
        if page == 0 {
            return Err(CoreError::Validation("page starts at 1".to_string()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(CoreError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| CoreError::Validation(format!("page {} is out of range", page)))?;
        self.store.list_collections(offset, limit).await
    }

    pub async fn cluster(&self, title: &str, viewer: Option<Uuid>) -> Result<CollectionView> {
        let collection = self.collection_titled(title).await?;
        let owner = self.user(collection.owner_id).await?;

        let (is_owner, is_following) = match viewer {
            Some(viewer) => (
                viewer == collection.owner_id,
                self.store
                    .is_following_collection(viewer, collection.id)
                    .await?,
            ),
            None => (false, false),
        };

        Ok(CollectionView {
            collection,
            owner_username: owner.username,
            is_owner,
            is_following,
        })
    }

    /// Images in a collection; `NotFound` when the title does not exist
    pub async fn cluster_images(&self, title: &str) -> Result<Vec<Image>> {
        let collection = self.collection_titled(title).await?;
        self.store.collection_images(collection.id).await
    }

    pub async fn user_clusters(&self, username: &str) -> Result<Vec<Collection>> {
        let user = self.user_named(username).await?;
        self.store.collections_by_owner(user.id).await
    }

    /// Images in a collection owned by `username`
    pub async fn user_cluster_images(&self, username: &str, title: &str) -> Result<Vec<Image>> {
        let user = self.user_named(username).await?;
        let collection = self.collection_titled(title).await?;
        if collection.owner_id != user.id {
            return Err(CoreError::not_found("collection", title));
        }
        self.store.collection_images(collection.id).await
    }

    pub async fn profile(&self, username: &str, viewer: Option<Uuid>) -> Result<Profile> {
        let user = self.user_named(username).await?;
        let (is_owner, is_following) = match viewer {
            Some(viewer) if viewer == user.id => (true, false),
            Some(viewer) => (false, self.store.is_following_user(viewer, user.id).await?),
            None => (false, false),
        };
        Ok(Profile::new(user, is_owner, is_following))
    }

    /// Feed of the newest images
    pub async fn latest_images(&self, limit: u64) -> Result<Vec<Image>> {
        self.store
            .latest_images(limit.clamp(1, MAX_FEED_LIMIT))
            .await
    }

    pub async fn image(&self, id: Uuid) -> Result<Image> {
        self.store
            .image_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("image", id))
    }

    pub async fn popular_tags(&self, limit: u64) -> Result<Vec<TagCount>> {
        self.store
            .popular_tags(limit.clamp(1, MAX_PAGE_LIMIT))
            .await
    }

    /// Full-text search over title, description and tags
    pub async fn search_images(&self, query: &str) -> Result<Vec<Image>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::Validation("search query is required".to_string()));
        }
        self.store.search_images(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rstest::rstest;

    const SECRET: &[u8] = b"catalog-test-secret";

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()), TokenService::new(SECRET))
    }

    fn signup(username: &str) -> Signup {
        Signup {
            name: format!("{} name", username),
            username: username.to_string(),
            password: "correct_horse".to_string(),
            avatar: None,
            bio: None,
        }
    }

    fn upload(title: &str, collection: &str) -> ImageUpload {
        ImageUpload {
            url: format!("http://localhost:8000/objects/media/{}.jpg", Uuid::new_v4()),
            title: title.to_string(),
            desc: None,
            hash: None,
            tags: vec![],
            collection: collection.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_login_resolve() {
        let catalog = catalog();
        let user = catalog.create_user(signup("alice")).await.unwrap();
        assert_eq!(user.collection_count, 0);
        assert_eq!(user.follower_count, 0);
        assert_eq!(user.following_count, 0);

        let token = catalog.authenticate("alice", "correct_horse").await.unwrap();
        let session = catalog.resolve_token(&token.token).await.unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_signup_inserts_nothing() {
        let catalog = catalog();
        let first = catalog.create_user(signup("alice")).await.unwrap();

        let mut again = signup("alice");
        again.password = "other".to_string();
        let err = catalog.create_user(again).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateUsername(_)));

        // the original credentials still work
        let token = catalog.authenticate("alice", "correct_horse").await.unwrap();
        assert_eq!(catalog.verify_token(&token.token).unwrap().id, first.id);
        assert!(catalog.authenticate("alice", "other").await.is_err());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let catalog = catalog();
        catalog.create_user(signup("alice")).await.unwrap();

        assert!(matches!(
            catalog.authenticate("bob", "x").await,
            Err(CoreError::UserNotFound(_))
        ));
        assert!(matches!(
            catalog.authenticate("alice", "wrong").await,
            Err(CoreError::InvalidPassword)
        ));
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("dash-name")]
    #[case("me")]
    #[case("a_very_long_username_that_exceeds_the_limit")]
    #[tokio::test]
    async fn test_signup_rejects_bad_usernames(#[case] username: &str) {
        let err = catalog().create_user(signup(username)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_signup_requires_password_and_name() {
        let catalog = catalog();
        let mut form = signup("alice");
        form.password = String::new();
        assert!(matches!(
            catalog.create_user(form).await,
            Err(CoreError::Validation(_))
        ));

        let mut form = signup("alice");
        form.name = "   ".to_string();
        assert!(matches!(
            catalog.create_user(form).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_tokens() {
        let catalog = catalog();
        assert!(matches!(
            catalog.resolve_token("garbage").await,
            Err(CoreError::InvalidToken(_))
        ));

        let expired = TokenService::with_validity(SECRET, Duration::hours(-1))
            .issue(Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            catalog.resolve_token(&expired.token).await,
            Err(CoreError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_token_for_deleted_user() {
        let catalog = catalog();
        let ghost = catalog.tokens().issue(Uuid::new_v4()).unwrap();

        assert!(matches!(
            catalog.resolve_user(&ghost.token).await,
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            catalog.resolve_token(&ghost.token).await,
            Err(CoreError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_unfollow_restores_counters() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();

        let edge = catalog.follow("bob", alice.id).await.unwrap();
        let again = catalog.follow("bob", alice.id).await.unwrap();
        assert_eq!(edge.id, again.id);

        assert_eq!(catalog.user(bob.id).await.unwrap().follower_count, 1);
        assert_eq!(catalog.user(alice.id).await.unwrap().following_count, 1);

        let profile = catalog.profile("bob", Some(alice.id)).await.unwrap();
        assert!(profile.is_following);
        assert!(!profile.is_owner);

        catalog.unfollow("bob", alice.id).await.unwrap();
        assert_eq!(catalog.user(bob.id).await.unwrap().follower_count, 0);
        assert_eq!(catalog.user(alice.id).await.unwrap().following_count, 0);

        assert!(matches!(
            catalog.unfollow("bob", alice.id).await,
            Err(CoreError::EdgeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_errors() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();

        assert!(matches!(
            catalog.follow("alice", alice.id).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            catalog.follow("nobody", alice.id).await,
            Err(CoreError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_collection_follow() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();
        catalog
            .create_collection("nature", None, None, alice.id)
            .await
            .unwrap();

        catalog.follow_collection("nature", bob.id).await.unwrap();
        catalog.follow_collection("nature", bob.id).await.unwrap();

        let view = catalog.cluster("nature", Some(bob.id)).await.unwrap();
        assert_eq!(view.collection.follower_count, 1);
        assert!(view.is_following);
        assert!(!view.is_owner);
        assert_eq!(view.owner_username, "alice");

        catalog.unfollow_collection("nature", bob.id).await.unwrap();
        let view = catalog.cluster("nature", None).await.unwrap();
        assert_eq!(view.collection.follower_count, 0);

        assert!(matches!(
            catalog.follow_collection("missing", bob.id).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_collection_duplicate_title() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        catalog
            .create_collection("nature", Some("trees".into()), None, alice.id)
            .await
            .unwrap();

        let err = catalog
            .create_collection("nature", None, None, alice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource { .. }));
        assert_eq!(catalog.user(alice.id).await.unwrap().collection_count, 1);
    }

    #[tokio::test]
    async fn test_two_uploads_one_collection() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();

        catalog.upload_image(upload("one", "nature"), alice.id).await.unwrap();
        catalog.upload_image(upload("two", "nature"), alice.id).await.unwrap();

        let page = catalog.list_clusters(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].image_count, 2);
        assert_eq!(catalog.cluster_images("nature").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_collection_cascades() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();

        let image = catalog.upload_image(upload("one", "nature"), alice.id).await.unwrap();
        catalog.follow_collection("nature", bob.id).await.unwrap();

        assert!(matches!(
            catalog.delete_collection("nature", bob.id).await,
            Err(CoreError::Unauthorized(_))
        ));

        let removed = catalog.delete_collection("nature", alice.id).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, image.id);

        assert!(matches!(
            catalog.cluster_images("nature").await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(catalog.image(image.id).await, Err(CoreError::NotFound { .. })));
        assert_eq!(catalog.user(alice.id).await.unwrap().collection_count, 0);
    }

    #[tokio::test]
    async fn test_empty_collection_is_not_missing() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        catalog
            .create_collection("empty", None, None, alice.id)
            .await
            .unwrap();

        assert!(catalog.cluster_images("empty").await.unwrap().is_empty());
        assert!(catalog.cluster_images("absent").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_image_updates_count() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let image = catalog.upload_image(upload("one", "nature"), alice.id).await.unwrap();
        catalog.upload_image(upload("two", "nature"), alice.id).await.unwrap();

        catalog.delete_image(image.id, alice.id).await.unwrap();
        let view = catalog.cluster("nature", Some(alice.id)).await.unwrap();
        assert_eq!(view.collection.image_count, 1);
        assert!(view.is_owner);

        assert!(matches!(
            catalog.delete_image(image.id, alice.id).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let mallory = catalog.create_user(signup("mallory")).await.unwrap();

        let token = catalog.authenticate("alice", "correct_horse").await.unwrap();
        let session = catalog.resolve_token(&token.token).await.unwrap();
        assert_eq!(session.id, alice.id);

        let image = catalog
            .upload_image(upload("sunset", "nature"), session.id)
            .await
            .unwrap();

        let images = catalog.cluster_images("nature").await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].title, "sunset");

        assert!(matches!(
            catalog.delete_image(image.id, mallory.id).await,
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();

        assert!(matches!(
            catalog
                .update_user(bob.id, alice.id, UserUpdate::default())
                .await,
            Err(CoreError::Unauthorized(_))
        ));

        let taken = UserUpdate {
            username: Some("bob".into()),
            ..Default::default()
        };
        assert!(matches!(
            catalog.update_user(alice.id, alice.id, taken).await,
            Err(CoreError::DuplicateUsername(_))
        ));

        let update = UserUpdate {
            username: Some("alicia".into()),
            password: Some("new_secret".into()),
            bio: Some("hello".into()),
            ..Default::default()
        };
        let updated = catalog.update_user(alice.id, alice.id, update).await.unwrap();
        assert_eq!(updated.username, "alicia");
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.name, alice.name);

        assert!(catalog.authenticate("alicia", "new_secret").await.is_ok());
        assert!(matches!(
            catalog.authenticate("alice", "correct_horse").await,
            Err(CoreError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_cluster_views() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();
        catalog.upload_image(upload("one", "nature"), alice.id).await.unwrap();
        catalog.upload_image(upload("two", "city"), bob.id).await.unwrap();

        let clusters = catalog.user_clusters("alice").await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].title, "nature");

        assert_eq!(
            catalog.user_cluster_images("alice", "nature").await.unwrap().len(),
            1
        );
        assert!(matches!(
            catalog.user_cluster_images("alice", "city").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_clusters_pagination() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        for i in 0..5 {
            catalog
                .create_collection(&format!("c{}", i), None, None, alice.id)
                .await
                .unwrap();
        }

        let page = catalog.list_clusters(2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 2);

        let last = catalog.list_clusters(3, 2).await.unwrap();
        assert_eq!(last.data.len(), 1);

        assert!(catalog.list_clusters(0, 2).await.is_err());
        assert!(catalog.list_clusters(1, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_list_clusters_page_past_range() {
        let catalog = catalog();
        assert!(matches!(
            catalog.list_clusters(u64::MAX, 100).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_follows_insert_one_edge() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();
        let bob = catalog.create_user(signup("bob")).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let catalog = catalog.clone();
                tokio::spawn(async move { catalog.follow("bob", alice.id).await })
            })
            .collect();
        let mut edges = Vec::new();
        for task in tasks {
            edges.push(task.await.unwrap().unwrap());
        }

        assert_eq!(edges.iter().filter(|edge| edge.created).count(), 1);
        assert!(edges.iter().all(|edge| edge.id == edges[0].id));
        assert_eq!(catalog.user(bob.id).await.unwrap().follower_count, 1);
        assert_eq!(catalog.user(alice.id).await.unwrap().following_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_create_one_collection() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    catalog
                        .upload_image(upload(&format!("shot {}", i), "fresh"), alice.id)
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let page = catalog.list_clusters(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].image_count, 16);
        assert_eq!(catalog.cluster_images("fresh").await.unwrap().len(), 16);
        assert_eq!(catalog.user(alice.id).await.unwrap().collection_count, 1);
    }

    #[tokio::test]
    async fn test_search_and_tags() {
        let catalog = catalog();
        let alice = catalog.create_user(signup("alice")).await.unwrap();

        let mut beach = upload("Beach sunset", "nature");
        beach.tags = vec!["sea".into(), " sea ".into(), "".into(), "sky".into()];
        let stored = catalog.upload_image(beach, alice.id).await.unwrap();
        assert_eq!(stored.tags, vec!["sea".to_string(), "sky".to_string()]);

        let mut peak = upload("Mountain", "nature");
        peak.tags = vec!["sky".into()];
        catalog.upload_image(peak, alice.id).await.unwrap();

        assert_eq!(catalog.search_images("sunset").await.unwrap().len(), 1);
        assert_eq!(catalog.search_images("sky").await.unwrap().len(), 2);
        assert!(catalog.search_images("volcano").await.unwrap().is_empty());
        assert!(matches!(
            catalog.search_images("   ").await,
            Err(CoreError::Validation(_))
        ));

        let tags = catalog.popular_tags(10).await.unwrap();
        assert_eq!(tags[0].tag, "sky");
        assert_eq!(tags[0].count, 2);

        let feed = catalog.latest_images(100).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].title, "Mountain");
    }

    #[test]
    fn test_too_many_tags() {
        let tags = (0..=MAX_TAGS).map(|i| format!("t{}", i)).collect();
        assert!(matches!(normalize_tags(tags), Err(CoreError::Validation(_))));
    }
}
