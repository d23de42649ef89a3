//! A [`BlogStore`] kept in process memory.
//!
//! Enforces the same uniqueness, reference and cascade rules as the
//! PostgreSQL schema. Every operation holds one lock for its whole duration,
//! which makes each of them atomic.

use crate::store::{BlogStore, DbError, Result, UniqueField};
use async_trait::async_trait;
use quill_common::model::{
    Id,
    auth::PasswordHash,
    like::{Like, LikeOutcome, LikeToggle},
    post::{CreatePost, Post, PostChanges, PostCounts, PostDetail, PostMarker, PostSummary},
    user::{CreateUser, Email, User, UserCredentials, UserMarker, UserName},
};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, (User, PasswordHash)>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    likes: BTreeMap<(Id<UserMarker>, Id<PostMarker>), Like>,
}

impl Tables {
    fn like_count(&self, post_id: Id<PostMarker>) -> u64 {
        self.likes.keys().filter(|(_, post)| *post == post_id).count() as u64
    }

    fn summary(&self, post: &Post) -> Option<PostSummary> {
        let (author, _) = self.users.get(&post.author_id)?;

        Some(PostSummary {
            post: post.clone(),
            author: author.clone(),
            count: PostCounts {
                likes: self.like_count(post.id),
            },
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of like rows across all posts.
    pub async fn like_rows(&self) -> usize {
        self.tables.lock().await.likes.len()
    }

    /// Number of like rows that point at a post which no longer exists.
    pub async fn orphaned_like_rows(&self) -> usize {
        let tables = self.tables.lock().await;
        tables
            .likes
            .keys()
            .filter(|(_, post_id)| !tables.posts.contains_key(post_id))
            .count()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&user_id).map(|(user, _)| user.clone()))
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let tables = self.tables.lock().await;
        let credentials = tables
            .users
            .values()
            .find(|(user, _)| user.email == *email)
            .map(|(user, password_hash)| UserCredentials {
                user: user.clone(),
                password_hash: password_hash.clone(),
            });

        Ok(credentials)
    }

    async fn email_exists(&self, email: &Email) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().any(|(user, _)| user.email == *email))
    }

    async fn user_name_exists(&self, user_name: &UserName) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .any(|(user, _)| user.user_name == *user_name))
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables.lock().await;

        for (existing, _) in tables.users.values() {
            if existing.email == user.email {
                return Err(DbError::Duplicate(UniqueField::Email));
            }
            if existing.user_name == user.user_name {
                return Err(DbError::Duplicate(UniqueField::UserName));
            }
        }

        let created = User {
            id: Id::generate(),
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            full_name: user.full_name.clone(),
            profile_pic: None,
            created_at: OffsetDateTime::now_utc(),
        };
        tables
            .users
            .insert(created.id, (created.clone(), user.password_hash.clone()));

        Ok(created)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables.lock().await;
        Ok(tables.posts.get(&post_id).cloned())
    }

    async fn fetch_post_summaries(&self) -> Result<Vec<PostSummary>> {
        let tables = self.tables.lock().await;

        let mut summaries: Vec<PostSummary> = tables
            .posts
            .values()
            .filter_map(|post| tables.summary(post))
            .collect();
        summaries.sort_by(|a, b| {
            (b.post.created_at, b.post.id).cmp(&(a.post.created_at, a.post.id))
        });

        Ok(summaries)
    }

    async fn fetch_post_detail(&self, post_id: Id<PostMarker>) -> Result<Option<PostDetail>> {
        let tables = self.tables.lock().await;

        let Some(summary) = tables.posts.get(&post_id).and_then(|post| tables.summary(post))
        else {
            return Ok(None);
        };

        let mut likes: Vec<Like> = tables
            .likes
            .values()
            .filter(|like| like.post_id == post_id)
            .cloned()
            .collect();
        likes.sort_by(|a, b| (a.created_at, a.user_id).cmp(&(b.created_at, b.user_id)));

        Ok(Some(PostDetail {
            post: summary.post,
            author: summary.author,
            likes,
            count: summary.count,
        }))
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&post.author_id) {
            return Err(DbError::MissingReference);
        }

        let now = OffsetDateTime::now_utc();
        let created = Post {
            id: Id::generate(),
            title: post.title.clone(),
            content: post.content.clone(),
            featured_img: post.featured_img.clone(),
            author_id: post.author_id,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().await;

        let Some(post) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        changes.apply_to(post, OffsetDateTime::now_utc());

        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().await;

        let deleted = tables.posts.remove(&post_id);
        if deleted.is_some() {
            tables.likes.retain(|(_, liked_post), _| *liked_post != post_id);
        }

        Ok(deleted)
    }

    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Option<LikeOutcome>> {
        let mut tables = self.tables.lock().await;

        if !tables.posts.contains_key(&post_id) {
            return Ok(None);
        }
        if !tables.users.contains_key(&user_id) {
            return Err(DbError::MissingReference);
        }

        let toggle = if tables.likes.remove(&(user_id, post_id)).is_some() {
            LikeToggle::Unliked
        } else {
            let like = Like {
                user_id,
                post_id,
                created_at: OffsetDateTime::now_utc(),
            };
            tables.likes.insert((user_id, post_id), like.clone());
            LikeToggle::Liked(like)
        };

        Ok(Some(LikeOutcome {
            toggle,
            likes: tables.like_count(post_id),
        }))
    }
}
