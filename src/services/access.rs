// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role-based access checks.
//!
//! Roles are matched exactly; there is no hierarchy, so an endpoint open to
//! both users and admins must list both.

use crate::error::AppError;
use crate::models::{PublicUser, Role};

pub fn is_allowed(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

/// `Unauthenticated` without an identity, `Forbidden` for a role outside `allowed`.
pub fn authorize(user: Option<&PublicUser>, allowed: &[Role]) -> Result<(), AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;

    if is_allowed(user.role, allowed) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = %user.role, "Role not permitted");
        Err(AppError::Forbidden)
    }
}
