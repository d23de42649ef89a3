//! The session guard and cookie handling.

use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use quill_common::{
    model::{
        Id,
        auth::{SESSION_COOKIE_NAME, SessionKeys, SessionToken},
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use quill_db::store::BlogStore;
use std::sync::Arc;

/// The user behind the request's session cookie.
///
/// Rejects with 401 when the cookie is missing, forged or expired, and with
/// 404 when the token names a user that no longer exists.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn into_user(self) -> User {
        self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn BlogStore>: FromRef<S>,
    Arc<SessionKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE_NAME)
            .ok_or(ServerError::MissingSession)?;

        let claims = Arc::<SessionKeys>::from_ref(state)
            .verify(token.value())
            .map_err(ServerError::InvalidSession)?;

        let user = Arc::<dyn BlogStore>::from_ref(state)
            .fetch_user(claims.user_id)
            .await?
            .ok_or(ServerError::SessionUserNotFound(claims.user_id))?;

        Ok(Self { user })
    }
}

/// The cookie that carries a freshly issued session.
#[must_use]
pub fn session_cookie(token: SessionToken, validity: PositiveDuration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token.into_inner()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(validity.get())
        .build()
}

/// Matches [`session_cookie`] so that the browser drops it.
#[must_use]
pub fn session_removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME).path("/").build()
}
