use crate::server::ServerRouter;
use axum::Router;

mod auth;
mod likes;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(likes::routes())
}
