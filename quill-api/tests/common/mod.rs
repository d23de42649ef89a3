#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use quill_api::{
    config::ServerConfig,
    images::{ImageHost, ImageHostError},
    server::{self, ServerState},
};
use quill_common::model::{
    auth::{SESSION_COOKIE_NAME, SessionKeys, SessionSecret},
    image::{ImagePayload, ImageUrl},
};
use quill_db::memory::MemoryStore;
use serde_json::{Value, json};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tower::ServiceExt;

pub const PASSWORD: &str = "Wonder1and!";

/// A 1x1 transparent GIF.
pub const TINY_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Records uploads instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct RecordingImageHost {
    uploads: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingImageHost {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageHost for RecordingImageHost {
    async fn upload(&self, image: &ImagePayload) -> Result<ImageUrl, ImageHostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ImageHostError::Rejected {
                status: 400,
                message: "Invalid image file".to_owned(),
            });
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(image.media_type().to_owned());
        let url = format!("https://images.test/quill/{}.img", uploads.len());

        Ok(ImageUrl::new(url).unwrap())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub images: Arc<RecordingImageHost>,
    pub sessions: Arc<SessionKeys>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl TestResponse {
    /// The `name=value` part of the session cookie that was set.
    pub fn session(&self) -> String {
        let set_cookie = self.set_cookie.as_deref().expect("no cookie was set");
        set_cookie
            .split(';')
            .next()
            .unwrap()
            .trim()
            .to_owned()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(RecordingImageHost::default());
        let sessions = Arc::new(SessionKeys::new(&SessionSecret::new(
            "integration-test-secret".to_owned(),
        )));

        let state = ServerState {
            store: store.clone(),
            images: images.clone(),
            sessions: sessions.clone(),
            config,
        };

        Self {
            router: server::routes().with_state(state),
            store,
            images,
            sessions,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            request = request.header(header::COOKIE, session);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|value| value.to_str().unwrap().to_owned());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            set_cookie,
            body,
        }
    }

    pub async fn signup(&self, user_name: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": format!("{user_name}@example.com"),
                "fullName": format!("{user_name} Example"),
                "userName": user_name,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
            })),
        )
        .await
    }

    /// Signs up a user and returns their id with the session cookie.
    pub async fn signed_up(&self, user_name: &str) -> (String, String) {
        let response = self.signup(user_name).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        let id = response.body["user"]["id"].as_str().unwrap().to_owned();
        (id, response.session())
    }

    /// Creates a post and returns its id.
    pub async fn create_post(&self, session: &str, title: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/blog/create-blog",
                Some(session),
                Some(json!({ "title": title, "content": format!("All about {title}") })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        response.body["data"]["id"].as_str().unwrap().to_owned()
    }
}

pub fn session_cookie_prefix() -> String {
    format!("{SESSION_COOKIE_NAME}=")
}
