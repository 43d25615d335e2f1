//! In-memory store for tests and development
//!
//! All tables live behind one lock and every operation takes it for its whole
//! duration, so each workflow is atomic with respect to the others.

use super::Store;
use crate::model::{
    Collection, CollectionFollow, Follow, FollowEdge, Image, ImageCollection, NewCollection,
    NewImage, NewUser, Page, TagCount, User, UserChanges,
};
use crate::{CoreError, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    images: HashMap<Uuid, Image>,
    collections: HashMap<Uuid, Collection>,
    titles: HashMap<String, Uuid>,
    follows: HashMap<(Uuid, Uuid), Follow>,
    collection_follows: HashMap<(Uuid, Uuid), CollectionFollow>,
    memberships: HashSet<ImageCollection>,
}

impl Tables {
    fn adjust_user(&mut self, id: Uuid, apply: impl FnOnce(&mut User)) {
        if let Some(user) = self.users.get_mut(&id) {
            apply(user);
        }
    }

    fn adjust_collection(&mut self, id: Uuid, apply: impl FnOnce(&mut Collection)) {
        if let Some(collection) = self.collections.get_mut(&id) {
            apply(collection);
        }
    }

    fn insert_collection(&mut self, new: NewCollection) -> Result<Collection> {
        if self.titles.contains_key(&new.title) {
            return Err(CoreError::duplicate("collection", new.title));
        }
        if !self.users.contains_key(&new.owner_id) {
            return Err(CoreError::not_found("user", new.owner_id));
        }

        let collection = Collection {
            id: Uuid::new_v4(),
            title: new.title,
            desc: new.desc,
            thumbnail: new.thumbnail,
            owner_id: new.owner_id,
            image_count: 0,
            follower_count: 0,
            created_at: Utc::now(),
        };

        self.titles.insert(collection.title.clone(), collection.id);
        self.collections.insert(collection.id, collection.clone());
        self.adjust_user(collection.owner_id, |u| u.collection_count += 1);
        Ok(collection)
    }
}

fn decrement(value: &mut i64) {
    *value = (*value - 1).max(0);
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

/// Lowercase alphanumeric words of a text
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn matches_terms(image: &Image, terms: &[String]) -> bool {
    let mut vocabulary: HashSet<String> = words(&image.title).collect();
    if let Some(desc) = &image.desc {
        vocabulary.extend(words(desc));
    }
    for tag in &image.tags {
        vocabulary.extend(words(tag));
    }
    terms.iter().all(|term| vocabulary.contains(term))
}

/// Store keeping every table in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut tables = self.tables.write();
        if tables.usernames.contains_key(&new.username) {
            return Err(CoreError::DuplicateUsername(new.username));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            username: new.username,
            password_hash: new.password_hash,
            avatar: new.avatar,
            bio: new.bio,
            collection_count: 0,
            follower_count: 0,
            following_count: 0,
            created_at: Utc::now(),
        };

        tables.usernames.insert(user.username.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read();
        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let mut tables = self.tables.write();
        let current = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("user", id))?;

        if let Some(username) = &changes.username {
            if *username != current.username && tables.usernames.contains_key(username) {
                return Err(CoreError::DuplicateUsername(username.clone()));
            }
        }

        let mut user = current;
        if let Some(username) = changes.username {
            tables.usernames.remove(&user.username);
            tables.usernames.insert(username.clone(), id);
            user.username = username;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = Some(avatar);
        }

        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn follow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<FollowEdge> {
        let mut tables = self.tables.write();
        if let Some(edge) = tables.follows.get(&(follower_id, followed_id)) {
            return Ok(FollowEdge {
                id: edge.id,
                created: false,
            });
        }
        for id in [follower_id, followed_id] {
            if !tables.users.contains_key(&id) {
                return Err(CoreError::not_found("user", id));
            }
        }

        let edge = Follow {
            id: Uuid::new_v4(),
            follower_id,
            followed_id,
            created_at: Utc::now(),
        };
        let id = edge.id;
        tables.follows.insert((follower_id, followed_id), edge);
        tables.adjust_user(follower_id, |u| u.following_count += 1);
        tables.adjust_user(followed_id, |u| u.follower_count += 1);

        Ok(FollowEdge { id, created: true })
    }

    async fn unfollow_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.follows.remove(&(follower_id, followed_id)).is_none() {
            return Ok(false);
        }
        tables.adjust_user(follower_id, |u| decrement(&mut u.following_count));
        tables.adjust_user(followed_id, |u| decrement(&mut u.follower_count));
        Ok(true)
    }

    async fn is_following_user(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .follows
            .contains_key(&(follower_id, followed_id)))
    }

    async fn follow_collection(
        &self,
        follower_id: Uuid,
        collection_id: Uuid,
    ) -> Result<FollowEdge> {
        let mut tables = self.tables.write();
        if let Some(edge) = tables.collection_follows.get(&(follower_id, collection_id)) {
            return Ok(FollowEdge {
                id: edge.id,
                created: false,
            });
        }
        if !tables.users.contains_key(&follower_id) {
            return Err(CoreError::not_found("user", follower_id));
        }
        if !tables.collections.contains_key(&collection_id) {
            return Err(CoreError::not_found("collection", collection_id));
        }

        let edge = CollectionFollow {
            id: Uuid::new_v4(),
            follower_id,
            collection_id,
            created_at: Utc::now(),
        };
        let id = edge.id;
        tables
            .collection_follows
            .insert((follower_id, collection_id), edge);
        tables.adjust_collection(collection_id, |c| c.follower_count += 1);

        Ok(FollowEdge { id, created: true })
    }

    async fn unfollow_collection(&self, follower_id: Uuid, collection_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables
            .collection_follows
            .remove(&(follower_id, collection_id))
            .is_none()
        {
            return Ok(false);
        }
        tables.adjust_collection(collection_id, |c| decrement(&mut c.follower_count));
        Ok(true)
    }

    async fn is_following_collection(
        &self,
        follower_id: Uuid,
        collection_id: Uuid,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .collection_follows
            .contains_key(&(follower_id, collection_id)))
    }

    async fn insert_collection(&self, collection: NewCollection) -> Result<Collection> {
        self.tables.write().insert_collection(collection)
    }

    async fn collection_by_title(&self, title: &str) -> Result<Option<Collection>> {
        let tables = self.tables.read();
        Ok(tables
            .titles
            .get(title)
            .and_then(|id| tables.collections.get(id))
            .cloned())
    }

    async fn list_collections(&self, offset: u64, limit: u64) -> Result<Page<Collection>> {
        let tables = self.tables.read();
        let mut all: Vec<Collection> = tables.collections.values().cloned().collect();
        newest_first(&mut all, |c| c.created_at);

        let total = all.len() as u64;
        let data = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Page { data, total })
    }

    async fn collections_by_owner(&self, owner_id: Uuid) -> Result<Vec<Collection>> {
        let tables = self.tables.read();
        let mut owned: Vec<Collection> = tables
            .collections
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut owned, |c| c.created_at);
        Ok(owned)
    }

    async fn collection_images(&self, collection_id: Uuid) -> Result<Vec<Image>> {
        let tables = self.tables.read();
        let mut images: Vec<Image> = tables
            .memberships
            .iter()
            .filter(|m| m.collection_id == collection_id)
            .filter_map(|m| tables.images.get(&m.image_id))
            .cloned()
            .collect();
        newest_first(&mut images, |i| i.created_at);
        Ok(images)
    }

    async fn attach_image(
        &self,
        new: NewImage,
        collection_title: &str,
    ) -> Result<(Image, Collection)> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&new.owner_id) {
            return Err(CoreError::not_found("user", new.owner_id));
        }

        let existing = tables.titles.get(collection_title).copied();
        let collection_id = match existing {
            Some(id) => id,
            None => {
                tables
                    .insert_collection(NewCollection {
                        title: collection_title.to_string(),
                        desc: String::new(),
                        thumbnail: Some(new.url.clone()),
                        owner_id: new.owner_id,
                    })?
                    .id
            }
        };

        let image = Image {
            id: Uuid::new_v4(),
            url: new.url,
            title: new.title,
            desc: new.desc,
            hash: new.hash,
            tags: new.tags,
            owner_id: new.owner_id,
            created_at: Utc::now(),
        };

        tables.images.insert(image.id, image.clone());
        tables.memberships.insert(ImageCollection {
            image_id: image.id,
            collection_id,
        });
        tables.adjust_collection(collection_id, |c| c.image_count += 1);

        let collection = tables
            .collections
            .get(&collection_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("collection", collection_id))?;
        Ok((image, collection))
    }

    async fn image_by_id(&self, id: Uuid) -> Result<Option<Image>> {
        Ok(self.tables.read().images.get(&id).cloned())
    }

    async fn delete_image(&self, id: Uuid) -> Result<Option<Image>> {
        let mut tables = self.tables.write();
        let Some(image) = tables.images.remove(&id) else {
            return Ok(None);
        };

        let edges: Vec<ImageCollection> = tables
            .memberships
            .iter()
            .filter(|m| m.image_id == id)
            .copied()
            .collect();
        for edge in edges {
            tables.memberships.remove(&edge);
            tables.adjust_collection(edge.collection_id, |c| decrement(&mut c.image_count));
        }

        Ok(Some(image))
    }

    async fn delete_collection(&self, id: Uuid) -> Result<Vec<Image>> {
        let mut tables = self.tables.write();
        let collection = tables
            .collections
            .remove(&id)
            .ok_or_else(|| CoreError::not_found("collection", id))?;
        tables.titles.remove(&collection.title);

        let member_ids: Vec<Uuid> = tables
            .memberships
            .iter()
            .filter(|m| m.collection_id == id)
            .map(|m| m.image_id)
            .collect();
        tables.memberships.retain(|m| m.collection_id != id);
        tables.collection_follows.retain(|(_, cid), _| *cid != id);

        let mut removed = Vec::new();
        for image_id in member_ids {
            let still_member = tables.memberships.iter().any(|m| m.image_id == image_id);
            if !still_member {
                if let Some(image) = tables.images.remove(&image_id) {
                    removed.push(image);
                }
            }
        }

        tables.adjust_user(collection.owner_id, |u| decrement(&mut u.collection_count));
        Ok(removed)
    }

    async fn latest_images(&self, limit: u64) -> Result<Vec<Image>> {
        let tables = self.tables.read();
        let mut images: Vec<Image> = tables.images.values().cloned().collect();
        newest_first(&mut images, |i| i.created_at);
        images.truncate(limit as usize);
        Ok(images)
    }

    async fn search_images(&self, query: &str) -> Result<Vec<Image>> {
        let terms: Vec<String> = words(query).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.tables.read();
        let mut hits: Vec<Image> = tables
            .images
            .values()
            .filter(|image| matches_terms(image, &terms))
            .cloned()
            .collect();
        newest_first(&mut hits, |i| i.created_at);
        Ok(hits)
    }

    async fn popular_tags(&self, limit: u64) -> Result<Vec<TagCount>> {
        let tables = self.tables.read();
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for image in tables.images.values() {
            let distinct: HashSet<&str> = image.tags.iter().map(String::as_str).collect();
            for tag in distinct {
                *counts.entry(tag).or_default() += 1;
            }
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(limit as usize);
        Ok(tags)
    }
}
