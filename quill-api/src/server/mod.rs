use crate::{config::ServerConfig, images::ImageHost, images::ImageHostError};
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use quill_common::model::{
    Id,
    auth::{PasswordHashError, SessionError, SessionKeys},
    form::FormError,
    image::IMAGE_PAYLOAD_MAX_BYTES,
    post::PostMarker,
    user::UserMarker,
};
use quill_db::store::{BlogStore, DbError, UniqueField};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error};

pub mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn BlogStore>,
    pub images: Arc<dyn ImageHost>,
    pub sessions: Arc<SessionKeys>,
    pub config: ServerConfig,
}

/// Room for a base64 featured image of [`IMAGE_PAYLOAD_MAX_BYTES`] and the rest of a post.
pub const REQUEST_BODY_MAX_BYTES: usize = IMAGE_PAYLOAD_MAX_BYTES.div_ceil(3) * 4 + 1024 * 1024;

pub fn routes() -> ServerRouter {
    routes::routes()
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_MAX_BYTES))
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Unauthorized - no token provided")]
    MissingSession,
    #[error("Unauthorized - {0}")]
    InvalidSession(SessionError),
    #[error("Could not issue a session: {0}")]
    SessionIssue(SessionError),
    #[error("User not found for authentication")]
    SessionUserNotFound(Id<UserMarker>),
    #[error("{0}")]
    Form(#[from] FormError),
    #[error("Email is already in use")]
    EmailTaken,
    #[error("Username is already taken")]
    UserNameTaken,
    #[error("Email not found")]
    EmailNotFound,
    #[error("Password didn't match our records")]
    WrongPassword,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] JoinError),
    #[error("Blog not found")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Only the author of blog {0} may change it")]
    NotPostAuthor(Id<PostMarker>),
    #[error("A record this request refers to no longer exists")]
    MissingReference,
    #[error("Image upload failed: {0}")]
    ImageUpload(#[from] ImageHostError),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for ServerError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Duplicate(UniqueField::Email) => ServerError::EmailTaken,
            DbError::Duplicate(UniqueField::UserName) => ServerError::UserNameTaken,
            DbError::MissingReference => ServerError::MissingReference,
            err => ServerError::Database(err),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::SessionUserNotFound(_)
            | ServerError::EmailNotFound
            | ServerError::PostByIdNotFound(_)
            | ServerError::MissingReference => StatusCode::NOT_FOUND,
            ServerError::MissingSession | ServerError::InvalidSession(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::NotPostAuthor(_) => StatusCode::FORBIDDEN,
            ServerError::JsonRejection(rejection)
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE =>
            {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServerError::JsonRejection(_)
            | ServerError::Form(_)
            | ServerError::WrongPassword
            | ServerError::EmailTaken
            | ServerError::UserNameTaken => StatusCode::BAD_REQUEST,
            ServerError::ImageUpload(_) => StatusCode::BAD_GATEWAY,
            ServerError::JsonResponse(_)
            | ServerError::SessionIssue(_)
            | ServerError::PasswordHash(_)
            | ServerError::Blocking(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Server-side failures stay vague.
    fn public_message(&self, status: StatusCode) -> String {
        match status {
            StatusCode::BAD_GATEWAY => "Image upload failed".to_owned(),
            StatusCode::PAYLOAD_TOO_LARGE => "Request body is too large".to_owned(),
            status if status.is_server_error() => "Internal Server Error".to_owned(),
            _ => self.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.public_message(status),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use quill_common::model::{Id, ModelValidationError, form::FormError, user::Email};
    use quill_db::store::{DbError, UniqueField};

    #[test]
    fn store_conflicts_are_not_internal() {
        let err = ServerError::from(DbError::Duplicate(UniqueField::UserName));
        assert!(matches!(err, ServerError::UserNameTaken));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(err.status()), "Username is already taken");

        let err = ServerError::from(DbError::MissingReference);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn messages() {
        let err = ServerError::from(FormError::PasswordMismatch);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(err.status()),
            "Passwords did not match"
        );

        let err = ServerError::PostByIdNotFound(Id::generate());
        assert_eq!(err.public_message(err.status()), "Blog not found");

        let invalid = Email::new("not an email".into()).unwrap_err();
        let err = ServerError::from(DbError::Data(ModelValidationError::from(invalid)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.public_message(err.status()),
            "Internal Server Error"
        );
    }
}
