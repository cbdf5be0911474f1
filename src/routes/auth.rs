// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: register, login, Google sign-in, refresh and logout.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::PublicUser;
use crate::services::{
    GoogleCredential, GoogleLoginRequest, IssuedSession, LoginRequest, RegisterRequest,
    REFRESH_COOKIE,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OkResponse {
    pub ok: bool,
}

/// Returned by login, Google sign-in and refresh.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub ok: bool,
    pub access_token: String,
    pub user: PublicUser,
}

async fn register(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(StatusCode, Json<OkResponse>)> {
    state.credentials.register(req).await?;
    Ok((StatusCode::CREATED, Json(OkResponse { ok: true })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state.credentials.login(req).await?;
    Ok(start_session(&state, jar, session))
}

async fn google_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<GoogleLoginRequest>, AppError>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let credential = GoogleCredential::from_request(req)
        .ok_or_else(|| AppError::bad_request("NO_GOOGLE_TOKEN", "No Google token provided"))?;

    let session = state.credentials.login_with_google(credential).await?;
    Ok(start_session(&state, jar, session))
}

/// Issue a new access token from the refresh cookie. Only the access
/// cookie is rewritten.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let cookie = jar.get(REFRESH_COOKIE);
    let refreshed = state
        .authenticator
        .exchange_refresh(cookie.as_ref().map(|c| c.value()))
        .await?;

    let jar = jar.add(state.cookies.access_cookie(refreshed.access_token.clone()));

    Ok((
        jar,
        Json(SessionResponse {
            ok: true,
            access_token: refreshed.access_token,
            user: refreshed.user,
        }),
    ))
}

/// Always succeeds, with or without a session.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Json<OkResponse>) {
    (state.cookies.clear_session(jar), Json(OkResponse { ok: true }))
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    session: IssuedSession,
) -> (CookieJar, Json<SessionResponse>) {
    let jar = state
        .cookies
        .set_session(jar, session.access_token.clone(), session.refresh_token);

    (
        jar,
        Json(SessionResponse {
            ok: true,
            access_token: session.access_token,
            user: session.user,
        }),
    )
}
