// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::Response,
    Router,
};
use fitx_auth::config::Config;
use fitx_auth::db::MemoryUserStore;
use fitx_auth::models::{NewUser, Role, User, UserPatch};
use fitx_auth::routes::create_router;
use fitx_auth::services::{GoogleError, GoogleIdentityProvider, GoogleProfile};
use fitx_auth::AppState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Check if a PostgreSQL test database is configured.
#[allow(dead_code)]
pub fn postgres_available() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Skip test with message if no test database is configured.
#[macro_export]
macro_rules! require_postgres {
    () => {
        if !crate::common::postgres_available() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Google provider answering from a fixed token table.
#[derive(Default)]
pub struct FakeGoogle {
    profiles: Mutex<HashMap<String, GoogleProfile>>,
}

#[allow(dead_code)]
impl FakeGoogle {
    pub fn insert(&self, token: &str, profile: GoogleProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(token.to_string(), profile);
    }

    fn lookup(&self, token: &str) -> Result<GoogleProfile, GoogleError> {
        self.profiles
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| GoogleError::Rejected("unknown token".to_string()))
    }
}

#[async_trait]
impl GoogleIdentityProvider for FakeGoogle {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, GoogleError> {
        self.lookup(id_token)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        self.lookup(access_token)
    }
}

/// A test app and the handles tests poke at directly.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub google: Arc<FakeGoogle>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Create a test app backed by the in-memory store.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let google = Arc::new(FakeGoogle::default());
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryUserStore::new()),
        google.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        google,
    }
}

/// Insert a local user directly, with a cheap bcrypt hash.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, email: &str, password: &str, role: Role) -> User {
    let user = state
        .db
        .create_user(NewUser {
            email: email.to_string(),
            name: Some("Seeded".to_string()),
            password_hash: Some(bcrypt::hash(password, 4).unwrap()),
            ..Default::default()
        })
        .await
        .unwrap();

    if role == Role::User {
        return user;
    }

    state
        .db
        .update_user(
            user.id,
            UserPatch {
                role: Some(role),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Value part of a `Set-Cookie` header.
#[allow(dead_code)]
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Tokens from a successful login.
#[allow(dead_code)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub body: serde_json::Value,
}

/// Log in through the API and collect both session cookies.
#[allow(dead_code)]
pub async fn login(app: &TestApp, email: &str, password: &str) -> LoginTokens {
    let response = app
        .send(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await;
    assert_eq!(response.status(), 200, "login failed for {email}");

    let cookies = set_cookie_headers(&response);
    let access_token = cookie_value(&find_cookie(&cookies, "fitx_access"));
    let refresh_token = cookie_value(&find_cookie(&cookies, "fitx_refresh"));
    let body = body_json(response).await;

    LoginTokens {
        access_token,
        refresh_token,
        body,
    }
}
