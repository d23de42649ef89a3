use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    like::{Like, LikeToggle},
    post::PostMarker,
};
use quill_db::store::BlogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    Router::new().typed_post(toggle_like)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ToggleResponse {
    success: bool,
    message: &'static str,
    liked: bool,
    likes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Like>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/like-blog/{id}", rejection(ServerError))]
struct ToggleLikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    ToggleLikePath { id }: ToggleLikePath,
    State(store): State<Arc<dyn BlogStore>>,
    user: AuthenticatedUser,
) -> Result<Json<ToggleResponse>> {
    let outcome = store
        .toggle_like(user.user_id(), id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    debug!(post_id = %id, user_id = %user.user_id(), liked = outcome.liked(), likes = outcome.likes, "Toggled like");

    let response = match outcome.toggle {
        LikeToggle::Liked(like) => ToggleResponse {
            success: true,
            message: "Blog liked successfully",
            liked: true,
            likes: outcome.likes,
            data: Some(like),
        },
        LikeToggle::Unliked => ToggleResponse {
            success: true,
            message: "Blog unliked successfully",
            liked: false,
            likes: outcome.likes,
            data: None,
        },
    };

    Ok(Json(response))
}
