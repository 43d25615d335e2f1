//! PostgreSQL store
//!
//! Each workflow runs inside one transaction. Uniqueness comes from the
//! unique indexes in `schema.sql`; conflicting inserts surface as
//! `DuplicateUsername` / `DuplicateResource`.

use super::Store;
use crate::model::{
    Collection, FollowEdge, Image, NewCollection, NewImage, NewUser, Page, TagCount, User,
    UserChanges,
};
use crate::{CoreError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, username, password_hash, avatar, bio, \
     collection_count, follower_count, following_count, created_at";

const IMAGE_COLUMNS: &str = r#"id, url, title, "desc", hash, tags, owner_id, created_at"#;

const COLLECTION_COLUMNS: &str =
    r#"id, title, "desc", thumbnail, owner_id, image_count, follower_count, created_at"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn search_text(image: &NewImage) -> String {
    let mut parts = vec![image.title.as_str()];
    if let Some(desc) = &image.desc {
        parts.push(desc);
    }
    parts.extend(image.tags.iter().map(String::as_str));
    parts.join(" ")
}

/// Store backed by a PostgreSQL pool
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and create the schema if it is missing
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self::from_pool(pool);
        store.prepare().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema setup
    pub async fn prepare(&self) -> Result<()> {
        self.pool.execute(include_str!("schema.sql")).await?;
        info!("Database schema ready");
        Ok(())
    }

    async fn insert_collection_tx(
        tx: &mut Transaction<'_, Postgres>,
        new: NewCollection,
    ) -> Result<Collection> {
        let inserted = sqlx::query_as::<_, Collection>(&format!(
            r#"INSERT INTO collections (id, title, "desc", thumbnail, owner_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {COLLECTION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.desc)
        .bind(&new.thumbnail)
        .bind(new.owner_id)
        .fetch_one(&mut **tx)
        .await;

        let collection = match inserted {
            Ok(collection) => collection,
            Err(e) if is_unique_violation(&e) => {
                return Err(CoreError::duplicate("collection", new.title))
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query("UPDATE users SET collection_count = collection_count + 1 WHERE id = $1")
            .bind(collection.owner_id)
            .execute(&mut **tx)
            .await?;

        Ok(collection)
    }

    /// Create the collection an upload names, or lock the row a concurrent
    /// upload created first.
    async fn claim_collection_tx(
        tx: &mut Transaction<'_, Postgres>,
        title: &str,
        image: &NewImage,
    ) -> Result<Collection> {
        let inserted = sqlx::query_as::<_, Collection>(&format!(
            r#"INSERT INTO collections (id, title, "desc", thumbnail, owner_id)
               VALUES ($1, $2, '', $3, $4)
               ON CONFLICT (title) DO NOTHING
               RETURNING {COLLECTION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(&image.url)
        .bind(image.owner_id)
        .fetch_optional(&mut **tx)
        .await?;

        match inserted {
            Some(collection) => {
                sqlx::query(
                    "UPDATE users SET collection_count = collection_count + 1 WHERE id = $1",
                )
                .bind(collection.owner_id)
                .execute(&mut **tx)
                .await?;
                Ok(collection)
            }
            None => sqlx::query_as::<_, Collection>(&format!(
                "SELECT {COLLECTION_COLUMNS} FROM collections WHERE title = $1 FOR UPDATE"
            ))
            .bind(title)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::not_found("collection", title)),
        }
    }
}

fn bind_count(name: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| CoreError::Validation(format!("{} is out of range", name)))
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, new), fields(username = %new.username))]
    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, username, password_hash, avatar, bio)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .bind(&new.bio)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateUsername(new.username)),
            Err(e) => Err(e.into()),
        }
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, changes))]
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let requested_username = changes.username.clone();
        let result = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                 name = COALESCE($2, name),
                 username = COALESCE($3, username),
                 password_hash = COALESCE($4, password_hash),
                 bio = COALESCE($5, bio),
                 avatar = COALESCE($6, avatar)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(changes.bio)
        .bind(changes.avatar)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(CoreError::not_found("user", id)),
            Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateUsername(
                requested_username.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn follow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<FollowEdge> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO follows (id, follower_id, followed_id) VALUES ($1, $2, $3)
             ON CONFLICT (follower_id, followed_id) DO NOTHING
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&mut *tx)
        .await?;

        let edge = match inserted {
            Some(id) => {
                sqlx::query("UPDATE users SET following_count = following_count + 1 WHERE id = $1")
                    .bind(follower_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE users SET follower_count = follower_count + 1 WHERE id = $1")
                    .bind(followed_id)
                    .execute(&mut *tx)
                    .await?;
                FollowEdge { id, created: true }
            }
            None => {
                let id: Uuid = sqlx::query_scalar(
                    "SELECT id FROM follows WHERE follower_id = $1 AND followed_id = $2",
                )
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(&mut *tx)
                .await?;
                FollowEdge { id, created: false }
            }
        };

        tx.commit().await?;
        Ok(edge)
    }

    #[instrument(skip(self))]
    async fn unfollow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE users SET following_count = GREATEST(following_count - 1, 0) WHERE id = $1",
        )
        .bind(follower_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE users SET follower_count = GREATEST(follower_count - 1, 0) WHERE id = $1",
        )
        .bind(followed_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn is_following_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn follow_collection(
        &self,
        follower_id: Uuid,
        collection_id: Uuid,
    ) -> Result<FollowEdge> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO collection_follows (id, follower_id, collection_id) VALUES ($1, $2, $3)
             ON CONFLICT (follower_id, collection_id) DO NOTHING
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(collection_id)
        .fetch_optional(&mut *tx)
        .await?;

        let edge = match inserted {
            Some(id) => {
                sqlx::query(
                    "UPDATE collections SET follower_count = follower_count + 1 WHERE id = $1",
                )
                .bind(collection_id)
                .execute(&mut *tx)
                .await?;
                FollowEdge { id, created: true }
            }
            None => {
                let id: Uuid = sqlx::query_scalar(
                    "SELECT id FROM collection_follows WHERE follower_id = $1 AND collection_id = $2",
                )
                .bind(follower_id)
                .bind(collection_id)
                .fetch_one(&mut *tx)
                .await?;
                FollowEdge { id, created: false }
            }
        };

        tx.commit().await?;
        Ok(edge)
    }

    #[instrument(skip(self))]
    async fn unfollow_collection(&self, follower_id: Uuid, collection_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM collection_follows WHERE follower_id = $1 AND collection_id = $2",
        )
        .bind(follower_id)
        .bind(collection_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE collections SET follower_count = GREATEST(follower_count - 1, 0) WHERE id = $1",
        )
        .bind(collection_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn is_following_collection(
        &self,
        follower_id: Uuid,
        collection_id: Uuid,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM collection_follows
                            WHERE follower_id = $1 AND collection_id = $2)",
        )
        .bind(follower_id)
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self, collection), fields(title = %collection.title))]
    async fn insert_collection(&self, collection: NewCollection) -> Result<Collection> {
        let mut tx = self.pool.begin().await?;
        let collection = Self::insert_collection_tx(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(collection)
    }

    async fn collection_by_title(&self, title: &str) -> Result<Option<Collection>> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE title = $1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    async fn list_collections(&self, offset: u64, limit: u64) -> Result<Page<Collection>> {
        let offset = bind_count("offset", offset)?;
        let limit = bind_count("limit", limit)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(&self.pool)
            .await?;

        let data = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections
             ORDER BY created_at DESC
             OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            data,
            total: total.max(0) as u64,
        })
    }

    async fn collections_by_owner(&self, owner_id: Uuid) -> Result<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections
             WHERE owner_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(collections)
    }

    async fn collection_images(&self, collection_id: Uuid) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images
             WHERE id IN (SELECT image_id FROM image_collections WHERE collection_id = $1)
             ORDER BY created_at DESC"
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    #[instrument(skip(self, image), fields(title = %image.title))]
    async fn attach_image(
        &self,
        image: NewImage,
        collection_title: &str,
    ) -> Result<(Image, Collection)> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE title = $1 FOR UPDATE"
        ))
        .bind(collection_title)
        .fetch_optional(&mut *tx)
        .await?;

        let collection = match existing {
            Some(collection) => collection,
            None => Self::claim_collection_tx(&mut tx, collection_title, &image).await?,
        };

        let text = search_text(&image);
        let stored = sqlx::query_as::<_, Image>(&format!(
            r#"INSERT INTO images (id, url, title, "desc", hash, tags, search_text, owner_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {IMAGE_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&image.url)
        .bind(&image.title)
        .bind(&image.desc)
        .bind(&image.hash)
        .bind(&image.tags)
        .bind(text)
        .bind(image.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO image_collections (image_id, collection_id) VALUES ($1, $2)")
            .bind(stored.id)
            .bind(collection.id)
            .execute(&mut *tx)
            .await?;

        let collection = sqlx::query_as::<_, Collection>(&format!(
            "UPDATE collections SET image_count = image_count + 1 WHERE id = $1
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(collection.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((stored, collection))
    }

    async fn image_by_id(&self, id: Uuid) -> Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    #[instrument(skip(self))]
    async fn delete_image(&self, id: Uuid) -> Result<Option<Image>> {
        let mut tx = self.pool.begin().await?;

        let collections: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM image_collections WHERE image_id = $1 RETURNING collection_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        if !collections.is_empty() {
            sqlx::query(
                "UPDATE collections SET image_count = GREATEST(image_count - 1, 0)
                 WHERE id = ANY($1)",
            )
            .bind(&collections)
            .execute(&mut *tx)
            .await?;
        }

        let image = sqlx::query_as::<_, Image>(&format!(
            "DELETE FROM images WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, id: Uuid) -> Result<Vec<Image>> {
        let mut tx = self.pool.begin().await?;

        let owner_id: Uuid =
            sqlx::query_scalar("SELECT owner_id FROM collections WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::not_found("collection", id))?;

        let removed = sqlx::query_as::<_, Image>(&format!(
            "DELETE FROM images
             WHERE id IN (SELECT image_id FROM image_collections WHERE collection_id = $1)
               AND NOT EXISTS (
                   SELECT 1 FROM image_collections m
                   WHERE m.image_id = images.id AND m.collection_id <> $1
               )
             RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        // memberships and follow edges go with the row (ON DELETE CASCADE)
        sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE users SET collection_count = GREATEST(collection_count - 1, 0) WHERE id = $1",
        )
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn latest_images(&self, limit: u64) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(bind_count("limit", limit)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn search_images(&self, query: &str) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images
             WHERE to_tsvector('simple', search_text) @@ plainto_tsquery('simple', $1)
             ORDER BY created_at DESC"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn popular_tags(&self, limit: u64) -> Result<Vec<TagCount>> {
        let tags = sqlx::query_as::<_, TagCount>(
            "SELECT tag, COUNT(DISTINCT id) AS count
             FROM images, unnest(tags) AS tag
             GROUP BY tag
             ORDER BY count DESC, tag ASC
             LIMIT $1",
        )
        .bind(bind_count("limit", limit)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}
