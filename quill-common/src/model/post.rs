use crate::model::{
    Id,
    image::ImageUrl,
    like::Like,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub featured_img: Option<ImageUrl>,
    pub author_id: Id<UserMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostCounts {
    pub likes: u64,
}

/// A post as listed in the feed.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author: User,
    #[serde(rename = "_count")]
    pub count: PostCounts,
}

/// A single post with everyone who liked it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: User,
    pub likes: Vec<Like>,
    #[serde(rename = "_count")]
    pub count: PostCounts,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub featured_img: Option<ImageUrl>,
    pub author_id: Id<UserMarker>,
}

/// Fields to overwrite on an existing post. `None` keeps the stored value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub featured_img: Option<ImageUrl>,
}

impl PostChanges {
    /// Applies the changes to `post` in place, bumping `updated_at`.
    pub fn apply_to(&self, post: &mut Post, now: OffsetDateTime) {
        if let Some(title) = &self.title {
            post.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            post.content.clone_from(content);
        }
        if let Some(featured_img) = &self.featured_img {
            post.featured_img = Some(featured_img.clone());
        }
        post.updated_at = now;
    }
}
