// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication and role-gate middleware.

use crate::error::AppError;
use crate::models::{PublicUser, Role};
use crate::services::access::authorize;
use crate::services::ACCESS_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated user attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: PublicUser,
}

/// Middleware that requires a valid access token for an active user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);
    let cookie = jar.get(ACCESS_COOKIE);

    let user = state
        .authenticator
        .resolve_identity(authorization.as_deref(), cookie.as_ref().map(|c| c.value()))
        .await?;

    request.extensions_mut().insert(AuthUser { user });

    Ok(next.run(request).await)
}

/// Middleware that admits only identities whose role is in `allowed`.
///
/// Must run after [`require_auth`].
pub async fn require_role(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request.extensions().get::<AuthUser>().map(|a| &a.user);
    authorize(user, allowed)?;

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&[Role::Admin], request, next).await
}
