// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-request identity resolution and refresh exchange.

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{PublicUser, User};
use crate::services::token::TokenCodec;
use std::sync::Arc;

/// Where the presented access token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    BearerHeader,
    Cookie,
}

/// Pick the access token to verify.
///
/// A `Bearer` header wins whenever present, even if its token turns out to
/// be invalid; the cookie is only consulted when there is no such header.
pub fn select_token<'a>(
    authorization: Option<&'a str>,
    access_cookie: Option<&'a str>,
) -> Option<(TokenSource, &'a str)> {
    if let Some(token) = authorization.and_then(bearer_token) {
        return Some((TokenSource::BearerHeader, token));
    }

    access_cookie
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| (TokenSource::Cookie, t))
}

/// Token part of a `Bearer <token>` header, possibly empty.
/// Scheme match is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let scheme = header.get(..6)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let rest = &header[6..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim())
}

/// Result of exchanging a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub access_token: String,
    pub user: PublicUser,
}

/// Resolves the caller's identity from signed tokens and the store.
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenCodec,
    store: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(tokens: TokenCodec, store: Arc<dyn UserStore>) -> Self {
        Self { tokens, store }
    }

    /// Resolve the user behind an access token.
    ///
    /// Every failure other than a store timeout is reported as
    /// [`AppError::Unauthorized`].
    pub async fn resolve_identity(
        &self,
        authorization: Option<&str>,
        access_cookie: Option<&str>,
    ) -> Result<PublicUser, AppError> {
        let Some((source, token)) = select_token(authorization, access_cookie) else {
            tracing::debug!("No access token presented");
            return Err(AppError::Unauthorized);
        };

        let claims = self.tokens.verify_access(token).map_err(|e| {
            tracing::debug!(source = ?source, error = %e, "Access token rejected");
            AppError::Unauthorized
        })?;

        let user_id = claims.user_id().map_err(|_| AppError::Unauthorized)?;
        let user = self.active_user(user_id).await?;

        Ok(user.to_public())
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// The refresh token itself is not rotated.
    pub async fn exchange_refresh(
        &self,
        refresh_cookie: Option<&str>,
    ) -> Result<RefreshedAccess, AppError> {
        let token = refresh_cookie
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::NoRefreshToken)?;

        let claims = self.tokens.verify_refresh(token).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AppError::InvalidRefreshToken
        })?;

        let user_id = claims
            .user_id()
            .map_err(|_| AppError::InvalidRefreshToken)?;
        let user = self.active_user(user_id).await?;

        let access_token = self
            .tokens
            .sign_access(user.id)
            .map_err(|e| AppError::Internal(e.into()))?;

        tracing::debug!(user_id = %user.id, "Access token refreshed");

        Ok(RefreshedAccess {
            access_token,
            user: user.to_public(),
        })
    }

    async fn active_user(&self, user_id: uuid::Uuid) -> Result<User, AppError> {
        match self.store.find_by_id(user_id).await? {
            Some(user) if user.active => Ok(user),
            Some(_) => {
                tracing::debug!(user_id = %user_id, "Token for inactive user");
                Err(AppError::Unauthorized)
            }
            None => {
                tracing::debug!(user_id = %user_id, "Token for unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}
