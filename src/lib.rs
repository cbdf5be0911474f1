// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitX Auth: account, session and access-control backend for FitX
//!
//! This crate issues and verifies signed session tokens, manages the
//! session cookies, signs users in with a password or with Google, and
//! gates routes by role.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::{TimeoutStore, UserStore};
use services::{
    Authenticator, CredentialService, GoogleIdentityProvider, PasswordHasher, SessionCookies,
    TokenCodec,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Credential store, every call bounded by the query timeout
    pub db: Arc<dyn UserStore>,
    pub authenticator: Authenticator,
    pub credentials: CredentialService,
    pub cookies: SessionCookies,
}

impl AppState {
    /// Wire the services around `store` and `google`.
    pub fn new(
        config: Config,
        store: Arc<dyn UserStore>,
        google: Arc<dyn GoogleIdentityProvider>,
    ) -> Self {
        let db: Arc<dyn UserStore> = Arc::new(TimeoutStore::new(store, config.timeouts.query));
        let tokens = TokenCodec::from_config(&config);

        let authenticator = Authenticator::new(tokens.clone(), db.clone());
        let credentials = CredentialService::new(
            tokens,
            db.clone(),
            google,
            PasswordHasher::new(config.timeouts.password_hash),
            config.timeouts.login,
        );
        let cookies = SessionCookies::from_config(&config);

        Self {
            config,
            db,
            authenticator,
            credentials,
            cookies,
        }
    }
}
