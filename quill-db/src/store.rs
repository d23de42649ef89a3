use async_trait::async_trait;
use quill_common::model::{
    Id, ModelValidationError,
    like::LikeOutcome,
    post::{CreatePost, Post, PostChanges, PostDetail, PostMarker, PostSummary},
    user::{CreateUser, Email, User, UserCredentials, UserMarker, UserName},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum UniqueField {
    Email,
    UserName,
}

impl Display for UniqueField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::UserName => f.write_str("user name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The {0} is already in use")]
    Duplicate(UniqueField),
    #[error("A referenced row does not exist")]
    MissingReference,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Everything the API needs from persistent storage.
///
/// Lookups return `Ok(None)` for missing rows. Mutations addressed at a post
/// also return `Ok(None)` when the post does not exist, so callers never have
/// to tell a missing row apart from a storage failure by inspecting errors.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>>;

    async fn email_exists(&self, email: &Email) -> Result<bool>;

    async fn user_name_exists(&self, user_name: &UserName) -> Result<bool>;

    /// Fails with [`DbError::Duplicate`] if the email or user name is taken.
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// All posts, newest first.
    async fn fetch_post_summaries(&self) -> Result<Vec<PostSummary>>;

    async fn fetch_post_detail(&self, post_id: Id<PostMarker>) -> Result<Option<PostDetail>>;

    /// Fails with [`DbError::MissingReference`] if the author does not exist.
    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>>;

    /// Deletes the post along with its likes.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Removes the user's like on the post if there is one and adds it
    /// otherwise, as one atomic step.
    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Option<LikeOutcome>>;
}
