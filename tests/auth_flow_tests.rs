// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end registration and password login tests.

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{body_json, find_cookie, get_with_bearer, json_request, set_cookie_headers};

async fn register(app: &common::TestApp, name: &str, email: &str, password: &str) -> axum::response::Response {
    app.send(json_request(
        "POST",
        "/auth/register",
        json!({ "name": name, "email": email, "password": password }),
    ))
    .await
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = common::create_test_app();

    let response = register(&app, "Alice", "alice@example.com", "secret1").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({ "ok": true }));

    let tokens = common::login(&app, "alice@example.com", "secret1").await;
    assert_eq!(tokens.body["ok"], true);
    assert_eq!(tokens.body["accessToken"], tokens.access_token.as_str());
    assert!(tokens.body["user"].get("passwordHash").is_none());
    assert!(tokens.body["user"].get("password_hash").is_none());

    let response = app
        .send(get_with_bearer("/account/me", &tokens.access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let user = &body["user"];
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["name"], "Alice");
    assert_eq!(user["role"], "USER");
    assert_eq!(user["active"], true);
    assert_eq!(user["subscriptionPlan"], "FREE");
    assert_eq!(user["subscriptionBilling"], serde_json::Value::Null);
    assert!(user.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_normalizes_email() {
    let app = common::create_test_app();

    let response = register(&app, "  Bob ", "  Bob@Example.COM ", "secret1").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = app
        .state
        .db
        .find_by_email("bob@example.com")
        .await
        .unwrap()
        .expect("user should be stored under normalized email");
    assert_eq!(stored.name.as_deref(), Some("Bob"));
    assert!(stored.password_hash.as_deref().unwrap().starts_with("$2"));

    common::login(&app, "BOB@example.com", "secret1").await;
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = common::create_test_app();
    register(&app, "Alice", "alice@example.com", "secret1").await;

    for (email, password) in [
        ("alice@example.com", "secret1"),
        ("ALICE@example.com", "another-password"),
    ] {
        let response = register(&app, "Alice 2", email, password).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "EMAIL_EXISTS");
    }
}

#[tokio::test]
async fn test_register_validation_issues() {
    let app = common::create_test_app();

    let response = register(&app, "   ", "not-an-email", "123").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let fields: Vec<&str> = body["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["path"][0].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "name", "password"]);
}

#[tokio::test]
async fn test_register_missing_fields_are_validation_errors() {
    let app = common::create_test_app();

    let response = app
        .send(json_request("POST", "/auth/register", json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_sets_both_cookies() {
    let app = common::create_test_app();
    register(&app, "Alice", "alice@example.com", "secret1").await;

    let response = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "secret1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookie_headers(&response);
    let access = find_cookie(&cookies, "fitx_access");
    let refresh = find_cookie(&cookies, "fitx_refresh");

    assert!(access.contains("Path=/;") || access.ends_with("Path=/"));
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Max-Age=900"));
    assert!(refresh.contains("Path=/auth/refresh"));
    assert!(refresh.contains("HttpOnly"));
    assert!(refresh.contains("Max-Age=604800"));
}

#[tokio::test]
async fn test_login_failures_do_not_enumerate_accounts() {
    let app = common::create_test_app();
    register(&app, "Alice", "alice@example.com", "secret1").await;

    let wrong_password = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "wrong-password" }),
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "secret1" }),
        ))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_headers(&wrong_password).is_empty());

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a["error"], "INVALID_CREDENTIALS");
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_login_malformed_body() {
    let app = common::create_test_app();

    let response = app
        .send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "INVALID_BODY");
}

#[tokio::test]
async fn test_inactive_user_login_is_forbidden() {
    let app = common::create_test_app();
    let user = common::seed_user(
        &app.state,
        "sleepy@example.com",
        "secret1",
        fitx_auth::models::Role::User,
    )
    .await;
    app.state
        .db
        .update_user(
            user.id,
            fitx_auth::models::UserPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "sleepy@example.com", "password": "secret1" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie_headers(&response).is_empty());
    assert_eq!(body_json(response).await["error"], "INACTIVE");
}
