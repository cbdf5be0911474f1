// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin user management. Every route here sits behind the ADMIN gate.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::db::UserQuery;
use crate::error::{AppError, Result};
use crate::models::{PublicUser, Role, SubscriptionBilling, SubscriptionPlan, UserPatch};
use crate::routes::account::UserResponse;
use crate::routes::auth::OkResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user).delete(delete_user))
        .route("/admin/users/{id}/role", patch(set_role))
        .route("/admin/users/{id}/subscription", patch(set_subscription))
        .route("/admin/users/{id}/active", patch(set_active))
}

/// Query parameters for the user listing. Bad numbers fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    q: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

impl ListUsersParams {
    fn into_query(self) -> UserQuery {
        let defaults = UserQuery::default();
        let number = |raw: Option<String>, default: u32| {
            raw.and_then(|s| s.trim().parse::<i64>().ok())
                .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
                .unwrap_or(default)
        };

        UserQuery {
            search: self.q,
            page: number(self.page, defaults.page),
            limit: number(self.limit, defaults.limit),
        }
        .normalized()
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserListResponse {
    pub items: Vec<PublicUser>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSubscriptionRequest {
    #[serde(default)]
    plan: String,
    #[serde(default)]
    billing: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    active: bool,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<UserListResponse>> {
    let query = params.into_query();
    let page = state.db.list_users(&query).await?;

    Ok(Json(UserListResponse {
        items: page.items.iter().map(PublicUser::from).collect(),
        total: page.total,
        page: query.page,
        limit: query.limit,
    }))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let user = state
        .db
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<SetRoleRequest>, AppError>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let role: Role = req
        .role
        .parse()
        .map_err(|_| AppError::bad_request("INVALID_ROLE", "Role must be USER or ADMIN"))?;

    let patch = UserPatch {
        role: Some(role),
        ..Default::default()
    };
    let user = state.db.update_user(id, patch).await?;

    tracing::info!(user_id = %id, role = %role, "Role changed");
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

/// Set the plan; billing is cleared when omitted. Restarts `subscription_since`.
async fn set_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<SetSubscriptionRequest>, AppError>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let plan: SubscriptionPlan = req.plan.parse().map_err(|_| {
        AppError::bad_request("INVALID_PLAN", "Plan must be FREE, BASIC, PRO or ELITE")
    })?;
    let billing = match req.billing.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<SubscriptionBilling>().map_err(|_| {
            AppError::bad_request("INVALID_BILLING", "Billing must be MONTHLY or YEARLY")
        })?),
    };

    let patch = UserPatch {
        subscription_plan: Some(plan),
        subscription_billing: Some(billing),
        subscription_since: Some(Utc::now()),
        ..Default::default()
    };
    let user = state.db.update_user(id, patch).await?;

    tracing::info!(user_id = %id, plan = %plan, "Subscription changed");
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

async fn set_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<SetActiveRequest>, AppError>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let patch = UserPatch {
        active: Some(req.active),
        ..Default::default()
    };
    let user = state.db.update_user(id, patch).await?;

    tracing::info!(user_id = %id, active = req.active, "Account activation changed");
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>> {
    let id = parse_id(&id)?;
    state.db.delete_user(id).await?;

    tracing::info!(user_id = %id, "User deleted");
    Ok(Json(OkResponse { ok: true }))
}

/// Ids that are not UUIDs cannot exist.
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("User not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MAX_PAGE_LIMIT;

    fn params(q: Option<&str>, page: Option<&str>, limit: Option<&str>) -> ListUsersParams {
        ListUsersParams {
            q: q.map(str::to_string),
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn list_params_default_and_clamp() {
        assert_eq!(params(None, None, None).into_query(), UserQuery::default());

        let q = params(Some(" Run "), Some("-3"), Some("999")).into_query();
        assert_eq!(q.search.as_deref(), Some("run"));
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, MAX_PAGE_LIMIT);

        let q = params(None, Some("abc"), Some("0")).into_query();
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 1);
    }

    #[test]
    fn non_uuid_ids_are_not_found() {
        assert!(matches!(parse_id("42"), Err(AppError::NotFound(_))));
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
