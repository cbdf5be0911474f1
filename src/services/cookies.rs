// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie construction.

use crate::config::Config;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::time::Duration;

/// Access token cookie, sent on every request.
pub const ACCESS_COOKIE: &str = "fitx_access";
/// Refresh token cookie, only sent to the refresh endpoint.
pub const REFRESH_COOKIE: &str = "fitx_refresh";

/// Builds the two session cookies with attributes fixed at startup.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    secure: bool,
    same_site: SameSite,
    refresh_path: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionCookies {
    pub fn from_config(config: &Config) -> Self {
        // Cross-site frontends need SameSite=None, which browsers only
        // accept together with Secure.
        let (secure, same_site) = if config.is_production() {
            (true, SameSite::None)
        } else {
            (false, SameSite::Lax)
        };

        Self {
            secure,
            same_site,
            refresh_path: config.refresh_path(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn access_cookie(&self, token: impl Into<String>) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, "/".to_string(), token.into(), self.access_ttl)
    }

    pub fn refresh_cookie(&self, token: impl Into<String>) -> Cookie<'static> {
        self.build(
            REFRESH_COOKIE,
            self.refresh_path.clone(),
            token.into(),
            self.refresh_ttl,
        )
    }

    /// Removal cookie matching [`Self::access_cookie`].
    pub fn clear_access(&self) -> Cookie<'static> {
        let mut cookie = self.access_cookie("");
        cookie.make_removal();
        cookie
    }

    /// Removal cookie matching [`Self::refresh_cookie`].
    pub fn clear_refresh(&self) -> Cookie<'static> {
        let mut cookie = self.refresh_cookie("");
        cookie.make_removal();
        cookie
    }

    /// Add both session cookies to `jar`.
    pub fn set_session(
        &self,
        jar: CookieJar,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> CookieJar {
        jar.add(self.access_cookie(access_token))
            .add(self.refresh_cookie(refresh_token))
    }

    /// Expire both session cookies.
    ///
    /// Uses `add` rather than `CookieJar::remove`, which emits nothing
    /// when the request carried no cookie of that name.
    pub fn clear_session(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.clear_access()).add(self.clear_refresh())
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    fn build(
        &self,
        name: &'static str,
        path: String,
        value: String,
        ttl: Duration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path(path)
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(max_age(ttl))
            .build()
    }
}

fn max_age(ttl: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}
