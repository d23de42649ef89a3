use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user_id: Id<UserMarker>,
    pub post_id: Id<PostMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum LikeToggle {
    Liked(Like),
    Unliked,
}

/// What a toggle did, and how many likes the post has afterwards.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LikeOutcome {
    pub toggle: LikeToggle,
    pub likes: u64,
}

impl LikeOutcome {
    #[must_use]
    pub fn liked(&self) -> bool {
        matches!(self.toggle, LikeToggle::Liked(_))
    }
}
