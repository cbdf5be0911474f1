// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Self-service account routes for the signed-in user.

use axum::{extract::State, routing::get, Extension, Json, Router};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidateUrl, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PublicUser, UserPatch};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/account/me", get(me).patch(update_me))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user: PublicUser,
}

/// Profile fields a user may change. Blank strings clear the field.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_avatar_url"))]
    pub avatar_url: Option<String>,
}

impl UpdateMeRequest {
    fn into_patch(self) -> UserPatch {
        let clearable = |v: String| {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        };

        UserPatch {
            name: self.name.map(clearable),
            avatar_url: self.avatar_url.map(clearable),
            ..Default::default()
        }
    }
}

fn validate_avatar_url(url: &str) -> std::result::Result<(), ValidationError> {
    let url = url.trim();
    if url.is_empty() || url.validate_url() {
        Ok(())
    } else {
        Err(ValidationError::new("url").with_message("Invalid avatar URL".into()))
    }
}

async fn me(Extension(auth): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse { user: auth.user })
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateMeRequest>, AppError>,
) -> Result<Json<UserResponse>> {
    req.validate()?;

    let patch = req.into_patch();
    let user = if patch.is_empty() {
        auth.user
    } else {
        state.db.update_user(auth.user.id, patch).await?.to_public()
    };

    tracing::debug!(user_id = %user.id, "Profile updated");
    Ok(Json(UserResponse { user }))
}
