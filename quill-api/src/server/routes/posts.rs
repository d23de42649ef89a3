use crate::{
    config::ServerConfig,
    images::ImageHost,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Envelope, Json},
    },
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    form::PostForm,
    image::{ImagePayload, ImageUrl},
    post::{CreatePost, Post, PostChanges, PostDetail, PostMarker, PostSummary},
};
use quill_db::store::BlogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_post)
        .typed_get(get_posts)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

async fn upload_image(
    images: &dyn ImageHost,
    image: Option<&ImagePayload>,
) -> Result<Option<ImageUrl>> {
    let Some(image) = image else {
        return Ok(None);
    };

    let url = images.upload(image).await?;
    info!(media_type = image.media_type(), url = url.get(), "Uploaded post image");

    Ok(Some(url))
}

/// Fetches the post that is about to be changed and checks the caller may change it.
async fn editable_post(
    store: &dyn BlogStore,
    config: ServerConfig,
    user: &AuthenticatedUser,
    id: Id<PostMarker>,
) -> Result<Post> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if config.enforce_post_ownership && post.author_id != user.user_id() {
        return Err(ServerError::NotPostAuthor(id));
    }

    Ok(post)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct CreatedPost {
    message: &'static str,
    data: Post,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/blog/create-blog", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(images): State<Arc<dyn ImageHost>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<(StatusCode, Json<CreatedPost>)> {
    let new_post = form.validate_new()?;
    let featured_img = upload_image(images.as_ref(), new_post.featured_img.as_ref()).await?;

    let post = store
        .create_post(&CreatePost {
            title: new_post.title,
            content: new_post.content,
            featured_img,
            author_id: user.user_id(),
        })
        .await?;
    info!(post_id = %post.id, author_id = %post.author_id, "Created post");

    Ok((
        StatusCode::CREATED,
        Json(CreatedPost {
            message: "Blog create successfully",
            data: post,
        }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/blog/get-blogs", rejection(ServerError))]
struct GetPostsPath();

async fn get_posts(
    GetPostsPath(): GetPostsPath,
    State(store): State<Arc<dyn BlogStore>>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<PostSummary>>> {
    let posts = store.fetch_post_summaries().await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/blog/get-blog/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(store): State<Arc<dyn BlogStore>>,
    _user: AuthenticatedUser,
) -> Result<Json<Envelope<PostDetail>>> {
    let post = store
        .fetch_post_detail(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(Envelope::new(post)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/blog/update-blog/{id}", rejection(ServerError))]
struct UpdatePostPath {
    id: Id<PostMarker>,
}

async fn update_post(
    UpdatePostPath { id }: UpdatePostPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(images): State<Arc<dyn ImageHost>>,
    State(config): State<ServerConfig>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Json<Envelope<Post>>> {
    let edit = form.validate_edit()?;
    editable_post(store.as_ref(), config, &user, id).await?;

    let featured_img = upload_image(images.as_ref(), edit.featured_img.as_ref()).await?;
    let changes = PostChanges {
        title: edit.title,
        content: edit.content,
        featured_img,
    };

    let post = store
        .update_post(id, &changes)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post_id = %id, user_id = %user.user_id(), "Updated post");

    Ok(Json(
        Envelope::new(post).with_message("Blog updated successfully"),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/blog/delete-blog/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(config): State<ServerConfig>,
    user: AuthenticatedUser,
) -> Result<Json<Envelope<Post>>> {
    editable_post(store.as_ref(), config, &user, id).await?;

    let post = store
        .delete_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post_id = %id, user_id = %user.user_id(), "Deleted post");

    Ok(Json(
        Envelope::new(post).with_message("Blog deleted successfully"),
    ))
}
