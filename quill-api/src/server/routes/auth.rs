use crate::{
    config::ServerConfig,
    server::{
        Result, ServerError, ServerRouter,
        auth::{AuthenticatedUser, session_cookie, session_removal_cookie},
        json::{Envelope, Json},
    },
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use quill_common::model::{
    Id,
    auth::{PasswordHash, SessionKeys},
    form::{LoginForm, SignupForm},
    user::{CreateUser, User, UserCredentials, UserMarker},
};
use quill_db::store::BlogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(signup)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(me)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UserResponse {
    user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

fn start_session(
    jar: CookieJar,
    user_id: Id<UserMarker>,
    sessions: &SessionKeys,
    config: ServerConfig,
) -> Result<CookieJar> {
    let token = sessions
        .issue(user_id)
        .map_err(ServerError::SessionIssue)?;

    Ok(jar.add(session_cookie(
        token,
        sessions.validity(),
        config.secure_cookies(),
    )))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/signup", rejection(ServerError))]
struct SignupPath();

async fn signup(
    SignupPath(): SignupPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(sessions): State<Arc<SessionKeys>>,
    State(config): State<ServerConfig>,
    jar: CookieJar,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, CookieJar, Json<UserResponse>)> {
    let signup = form.validate()?;

    let (email_taken, user_name_taken) = tokio::try_join!(
        store.email_exists(&signup.email),
        store.user_name_exists(&signup.user_name),
    )?;
    if email_taken {
        return Err(ServerError::EmailTaken);
    }
    if user_name_taken {
        return Err(ServerError::UserNameTaken);
    }

    let password = signup.password;
    let password_hash = task::spawn_blocking(move || PasswordHash::generate(&password)).await??;

    let user = store
        .create_user(&CreateUser {
            email: signup.email,
            user_name: signup.user_name,
            full_name: signup.full_name,
            password_hash,
        })
        .await?;
    info!(user_id = %user.id, user_name = user.user_name.get(), "Signed up new user");

    let jar = start_session(jar, user.id, &sessions, config)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserResponse {
            user,
            message: Some("Signup successfully"),
        }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(sessions): State<Arc<SessionKeys>>,
    State(config): State<ServerConfig>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(CookieJar, Json<Envelope<User>>)> {
    let login = form.validate()?;

    let UserCredentials {
        user,
        password_hash,
    } = store
        .fetch_credentials(&login.email)
        .await?
        .ok_or(ServerError::EmailNotFound)?;

    let password = login.password;
    let matches = task::spawn_blocking(move || password_hash.verify(&password)).await??;
    if !matches {
        return Err(ServerError::WrongPassword);
    }

    let jar = start_session(jar, user.id, &sessions, config)?;
    let message = format!("{} LoggedIn successfully", user.email.get());

    Ok((jar, Json(Envelope::new(user).with_message(message))))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/logout", rejection(ServerError))]
struct LogoutPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LogoutResponse {
    success: bool,
    message: &'static str,
}

async fn logout(
    LogoutPath(): LogoutPath,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    info!(user_id = %user.user_id(), "Logged out");

    (
        jar.remove(session_removal_cookie()),
        Json(LogoutResponse {
            success: true,
            message: "Logged out successfully",
        }),
    )
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/me", rejection(ServerError))]
struct MePath();

async fn me(MePath(): MePath, user: AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: user.into_user(),
        message: None,
    })
}
