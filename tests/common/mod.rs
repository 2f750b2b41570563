//! Helpers shared by the web API tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reviewboard_lib::db::users::{self, NewUser};
use reviewboard_lib::db::{self, pool::DbPool};
use reviewboard_lib::models::User;
use reviewboard_lib::webapi::{self, AppState};
use reviewboard_lib::ServerSettings;
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

pub const PASSWORD: &str = "password";

pub struct TestApp {
    _dir: TempDir,
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
        let state = AppState::new(pool, ServerSettings::default()).unwrap();
        let app = webapi::router(state.clone());

        Self {
            _dir: dir,
            state,
            app,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn user(&self, username: &str) -> User {
        self.create_user(username, false).await
    }

    pub async fn superuser(&self, username: &str) -> User {
        self.create_user(username, true).await
    }

    async fn create_user(&self, username: &str, is_superuser: bool) -> User {
        users::create_user(
            self.pool(),
            &NewUser {
                password: Some(PASSWORD.to_string()),
                is_superuser,
                ..NewUser::named(username)
            },
        )
        .await
        .unwrap()
    }

    /// Send a request and decode the JSON response (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }
}

pub fn basic(username: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, PASSWORD)))
}

pub fn token_auth(token: &str) -> String {
    format!("token {}", token)
}

/// The numbered error code of a failure body.
pub fn err_code(body: &Value) -> i64 {
    assert_eq!(body["stat"], "fail", "expected a failure body: {}", body);
    body["err"]["code"].as_i64().unwrap()
}
