// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error envelope, health routes, security headers and profile edits.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use fitx_auth::config::{Config, Environment};
use fitx_auth::db::{StoreError, UserPage, UserQuery, UserStore};
use fitx_auth::models::{NewUser, Role, User, UserPatch};
use fitx_auth::routes::create_router;
use fitx_auth::AppState;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{body_json, get_with_bearer};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Store whose every call never completes.
struct HangingStore;

#[async_trait]
impl UserStore for HangingStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        std::future::pending().await
    }

    async fn find_by_google_id(&self, _google_id: &str) -> Result<Option<User>, StoreError> {
        std::future::pending().await
    }

    async fn create_user(&self, _new: NewUser) -> Result<User, StoreError> {
        std::future::pending().await
    }

    async fn update_user(&self, _id: Uuid, _patch: UserPatch) -> Result<User, StoreError> {
        std::future::pending().await
    }

    async fn delete_user(&self, _id: Uuid) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn list_users(&self, _query: &UserQuery) -> Result<UserPage, StoreError> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

fn hanging_app() -> axum::Router {
    let mut config = Config::test_default();
    config.timeouts.query = Duration::from_millis(50);

    let state = Arc::new(AppState::new(
        config,
        Arc::new(HangingStore),
        Arc::new(common::FakeGoogle::default()),
    ));
    create_router(state)
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = common::create_test_app();

    let response = app.send(get("/no/such/route")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "NOT_FOUND");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_root_and_health() {
    let app = common::create_test_app();

    let response = app.send(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "name": "FitX API" }));

    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());

    let response = app.send(get("/db-ping")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "db": "ok" }));
}

#[tokio::test]
async fn test_hanging_store_reports_db_timeout() {
    let app = hanging_app();

    let response = app.clone().oneshot(get("/db-ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "DB_TIMEOUT");

    let response = app
        .oneshot(common::json_request(
            "POST",
            "/auth/login",
            json!({ "email": "slow@example.com", "password": "secret1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "DB_TIMEOUT");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = common::create_test_app();

    for uri in ["/health", "/no/such/route", "/account/me"] {
        let response = app.send(get(uri)).await;
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff", "{uri}");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY", "{uri}");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store", "{uri}");
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    let mut config = Config::test_default();
    config.environment = Environment::Production;
    let app = common::create_test_app_with_config(config);
    let response = app.send(get("/health")).await;
    assert!(response
        .headers()
        .get(header::STRICT_TRANSPORT_SECURITY)
        .is_some());
}

#[tokio::test]
async fn test_cors_allows_frontend_with_credentials() {
    let config = Config::test_default();
    let origin = config.frontend_url.trim_end_matches('/').to_string();
    let app = common::create_test_app_with_config(config);

    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/auth/login")
                .header(header::ORIGIN, origin.as_str())
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin.as_str());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/auth/refresh")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    for hostile in [
        "https://evil.example.com",
        "http://localhost.attacker.example",
        "http://127.0.0.1.nip.io.evil.example",
    ] {
        let response = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::ORIGIN, hostile)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none(),
            "{hostile} must not be allowed"
        );
    }
}

#[tokio::test]
async fn test_update_me() {
    let app = common::create_test_app();
    common::seed_user(&app.state, "me@example.com", "secret1", Role::User).await;
    let tokens = common::login(&app, "me@example.com", "secret1").await;

    let patch = |body: serde_json::Value| {
        Request::builder()
            .method("PATCH")
            .uri("/account/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let response = app
        .send(patch(json!({
            "name": "  New Name ",
            "avatarUrl": "https://cdn.fitx.app/me.png"
        })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "New Name");
    assert_eq!(body["user"]["avatarUrl"], "https://cdn.fitx.app/me.png");

    // Blank clears, absent is untouched.
    let response = app.send(patch(json!({ "avatarUrl": "" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "New Name");
    assert_eq!(body["user"]["avatarUrl"], serde_json::Value::Null);

    let response = app.send(patch(json!({ "avatarUrl": "not a url" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["issues"][0]["path"][0]
        .as_str()
        .unwrap()
        .to_lowercase()
        .starts_with("avatar"));

    // Role and plan cannot be changed through this route.
    let response = app
        .send(patch(json!({ "role": "ADMIN", "subscriptionPlan": "ELITE" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "USER");
    assert_eq!(body["user"]["subscriptionPlan"], "FREE");

    let response = app
        .send(get_with_bearer("/account/me", &tokens.access_token))
        .await;
    assert_eq!(body_json(response).await["user"]["name"], "New Name");
}
