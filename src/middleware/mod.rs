// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, role gate, security headers).

pub mod auth;
pub mod security;

pub use auth::{require_admin, require_auth, require_role, AuthUser};
