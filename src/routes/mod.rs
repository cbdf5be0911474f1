// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod account;
pub mod admin;
pub mod auth;

use crate::error::AppError;
use crate::middleware::auth::{require_admin, require_auth};
use crate::middleware::security::add_security_headers;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, Method};
use axum::response::{IntoResponse, Response};
use axum::{middleware, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
struct RootResponse {
    ok: bool,
    name: &'static str,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        ok: true,
        name: "FitX API",
    })
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

/// Round-trip to the credential store.
async fn db_ping(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    state.db.ping().await?;
    Ok(Json(serde_json::json!({ "db": "ok" })))
}

async fn not_found() -> Response {
    AppError::NotFound("Route not found".to_string()).into_response()
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/db-ping", get(db_ping))
        .merge(auth::routes());

    // Protected routes (auth required)
    let account_routes =
        account::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Admin routes: auth runs first (outermost), then the role gate.
    let admin_routes = admin::routes()
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(admin_routes);

    let app = if state.config.api_base_path.is_empty() {
        api
    } else {
        Router::new().nest(&state.config.api_base_path, api)
    };

    app.fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Credentialed CORS for the frontend, `CORS_ORIGIN` entries and local dev.
fn cors_layer(state: &AppState) -> CorsLayer {
    let mut allowed = state.config.cors_origins.clone();
    allowed.push(state.config.frontend_url.trim_end_matches('/').to_string());

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                allowed.iter().any(|o| o == origin_str) || is_local_dev_origin(origin_str)
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// `http(s)://localhost` or `http(s)://127.0.0.1`, with an optional port.
fn is_local_dev_origin(origin: &str) -> bool {
    let origin = origin.to_ascii_lowercase();
    let Some(authority) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };

    matches!(host, "localhost" | "127.0.0.1")
        && port.is_none_or(|p| {
            !p.is_empty() && p.len() <= 5 && p.bytes().all(|b| b.is_ascii_digit())
        })
}
