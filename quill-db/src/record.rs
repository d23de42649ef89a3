use quill_common::model::{
    ModelValidationError,
    auth::PasswordHash,
    image::ImageUrl,
    like::Like,
    post::{Post, PostCounts, PostSummary},
    user::{Email, User, UserCredentials, UserName},
};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub user_name: String,
    pub full_name: String,
    pub profile_pic: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: Uuid,
    pub title: String,
    pub content: String,
    pub featured_img: Option<String>,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with its author and like count.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostSummaryRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub email: String,
    pub user_name: String,
    pub full_name: String,
    pub profile_pic: Option<String>,
    pub user_created_at: OffsetDateTime,
    pub like_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct LikeRecord {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            email: Email::new(value.email)?,
            user_name: UserName::new(value.user_name)?,
            full_name: value.full_name,
            profile_pic: value.profile_pic,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<CredentialsRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user.try_into()?,
            password_hash: PasswordHash::from_stored(value.password_hash),
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            title: value.title,
            content: value.content,
            featured_img: value.featured_img.map(ImageUrl::new).transpose()?,
            author_id: value.author_id.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<PostSummaryRecord> for PostSummary {
    type Error = ModelValidationError;

    fn try_from(value: PostSummaryRecord) -> Result<Self, Self::Error> {
        let author = User {
            id: value.post.author_id.into(),
            email: Email::new(value.email)?,
            user_name: UserName::new(value.user_name)?,
            full_name: value.full_name,
            profile_pic: value.profile_pic,
            created_at: value.user_created_at,
        };

        Ok(Self {
            post: value.post.try_into()?,
            author,
            count: PostCounts {
                likes: value.like_count.unsigned_abs(),
            },
        })
    }
}

impl From<LikeRecord> for Like {
    fn from(value: LikeRecord) -> Self {
        Self {
            user_id: value.user_id.into(),
            post_id: value.post_id.into(),
            created_at: value.created_at,
        }
    }
}
