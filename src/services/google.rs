// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in verification.
//!
//! Two credential forms are accepted:
//! - an ID token, verified locally against Google's published signing keys
//!   (located through OpenID discovery and cached per `Cache-Control`),
//! - an OAuth access token, exchanged at the userinfo endpoint.

use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const OPENID_CONFIGURATION_URL: &str =
    "https://accounts.google.com/.well-known/openid-configuration";
const CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Used when Google omits `max-age`.
const FALLBACK_TTL: Duration = Duration::from_secs(5 * 60);
const ID_TOKEN_LEEWAY_SECS: u64 = 60;
const ACCEPTED_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Identity asserted by Google.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleProfile {
    /// Stable Google account id (`sub`)
    pub subject: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    /// `None` when Google did not say either way
    pub email_verified: Option<bool>,
}

/// Google verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GoogleError {
    /// The credential is invalid, expired or not meant for us.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Google could not be reached or answered with garbage.
    #[error("transient: {0}")]
    Transient(String),
}

/// Source of Google identities. Lets tests swap in a fake provider.
#[async_trait]
pub trait GoogleIdentityProvider: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, GoogleError>;

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError>;
}

/// Google endpoint URLs, overridable for tests.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub discovery_url: String,
    /// Key set location used until discovery has answered once
    pub fallback_jwks_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            discovery_url: OPENID_CONFIGURATION_URL.to_string(),
            fallback_jwks_url: CERTS_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }
}

type KeySet = HashMap<String, Arc<DecodingKey>>;

/// A cached value and the instant it goes stale.
struct Expiring<T> {
    value: T,
    stale_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            stale_at: Instant::now() + ttl,
        }
    }

    fn fresh(&self) -> Option<&T> {
        (Instant::now() < self.stale_at).then_some(&self.value)
    }
}

/// Verifies Google ID tokens and access tokens for our OAuth client.
pub struct GoogleVerifier {
    http: reqwest::Client,
    client_id: String,
    endpoints: GoogleEndpoints,
    /// Test-only key that replaces the published key set
    pinned: Option<(String, Arc<DecodingKey>)>,
    jwks_uri: RwLock<Option<Expiring<String>>>,
    keys: RwLock<Option<Expiring<KeySet>>>,
    /// Serializes key set reloads
    reload: Mutex<()>,
}

impl GoogleVerifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_endpoints(config, GoogleEndpoints::default())
    }

    pub fn with_endpoints(config: &Config, endpoints: GoogleEndpoints) -> anyhow::Result<Self> {
        let verifier = Self::build(config, endpoints, None)?;

        if verifier.client_id.is_empty() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; Google ID tokens will be rejected");
        } else {
            tracing::info!(client_id = %verifier.client_id, "Google sign-in enabled");
        }

        Ok(verifier)
    }

    /// Verifier that trusts exactly one RSA key under `kid` and never
    /// fetches Google's key set. For tests.
    pub fn with_pinned_key(
        config: &Config,
        endpoints: GoogleEndpoints,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        anyhow::ensure!(!kid.trim().is_empty(), "pinned key id is empty");

        Self::build(config, endpoints, Some((kid, Arc::new(key))))
    }

    fn build(
        config: &Config,
        endpoints: GoogleEndpoints,
        pinned: Option<(String, Arc<DecodingKey>)>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.upstream)
            .build()
            .context("building Google HTTP client")?;

        Ok(Self {
            http,
            client_id: config.google_client_id.clone(),
            endpoints,
            pinned,
            jwks_uri: RwLock::new(None),
            keys: RwLock::new(None),
            reload: Mutex::new(()),
        })
    }

    /// Signing key for `kid`. Google rotates keys, so a miss in a fresh
    /// cache still triggers one forced reload.
    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, GoogleError> {
        if let Some((pinned_kid, key)) = &self.pinned {
            return if pinned_kid == kid {
                Ok(key.clone())
            } else {
                Err(GoogleError::Rejected(format!("no pinned key with kid {kid}")))
            };
        }

        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        self.reload_keys(false).await?;
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        self.reload_keys(true).await?;
        self.cached_key(kid)
            .await
            .ok_or_else(|| GoogleError::Rejected(format!("kid {kid} is not a Google signing key")))
    }

    async fn cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys
            .read()
            .await
            .as_ref()
            .and_then(Expiring::fresh)
            .and_then(|keys| keys.get(kid).cloned())
    }

    async fn reload_keys(&self, force: bool) -> Result<(), GoogleError> {
        let _reloading = self.reload.lock().await;

        // Another request may have reloaded while we waited for the lock.
        if !force && self.keys.read().await.as_ref().and_then(Expiring::fresh).is_some() {
            return Ok(());
        }

        let uri = self.jwks_location(force).await;
        let (jwks, ttl) = self.get_json::<Jwks>(&uri, "key set").await?;

        let keys = signing_keys(jwks);
        if keys.is_empty() {
            return Err(GoogleError::Transient(format!(
                "key set at {uri} has no RS256 signing keys"
            )));
        }

        tracing::debug!(count = keys.len(), ttl_secs = ttl.as_secs(), "Loaded Google signing keys");
        *self.keys.write().await = Some(Expiring::new(keys, ttl));
        Ok(())
    }

    /// Key set URI from discovery. Discovery failures are not fatal: the
    /// last known URI (or the configured fallback) is used instead.
    async fn jwks_location(&self, force: bool) -> String {
        let last_known = {
            let cached = self.jwks_uri.read().await;
            if let Some(uri) = cached.as_ref().and_then(Expiring::fresh).filter(|_| !force) {
                return uri.clone();
            }
            cached.as_ref().map(|entry| entry.value.clone())
        };

        match self
            .get_json::<OpenIdConfiguration>(&self.endpoints.discovery_url, "discovery")
            .await
        {
            Ok((discovered, ttl)) => {
                *self.jwks_uri.write().await =
                    Some(Expiring::new(discovered.jwks_uri.clone(), ttl));
                discovered.jwks_uri
            }
            Err(e) => {
                let uri = last_known.unwrap_or_else(|| self.endpoints.fallback_jwks_url.clone());
                tracing::warn!(error = %e, jwks_uri = %uri, "OpenID discovery failed");
                uri
            }
        }
    }

    /// GET a JSON document along with how long it may be cached.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<(T, Duration), GoogleError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GoogleError::Transient(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GoogleError::Transient(format!("{what} returned {status}")));
        }

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(FALLBACK_TTL);

        let body = response
            .json::<T>()
            .await
            .map_err(|e| GoogleError::Transient(format!("{what} is not valid JSON: {e}")))?;

        Ok((body, ttl))
    }
}

#[async_trait]
impl GoogleIdentityProvider for GoogleVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, GoogleError> {
        if self.client_id.is_empty() {
            return Err(GoogleError::Rejected(
                "Google sign-in is not configured".to_string(),
            ));
        }

        let header = decode_header(id_token)
            .map_err(|e| GoogleError::Rejected(format!("malformed ID token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(GoogleError::Rejected(format!(
                "ID token signed with {:?}, expected RS256",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| GoogleError::Rejected("ID token has no kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&ACCEPTED_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = ID_TOKEN_LEEWAY_SECS;

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| GoogleError::Rejected(format!("ID token failed validation: {e}")))?
            .claims;

        tracing::debug!(
            subject = %claims.sub,
            email_verified = ?claims.email_verified,
            "Google ID token verified"
        );

        Ok(GoogleProfile {
            subject: Some(claims.sub),
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            email_verified: claims.email_verified,
        })
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GoogleError::Transient(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(GoogleError::Rejected(format!(
                "userinfo refused the access token ({status})"
            )));
        }
        if !status.is_success() {
            return Err(GoogleError::Transient(format!("userinfo returned {status}")));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| GoogleError::Transient(format!("userinfo is not valid JSON: {e}")))?;

        Ok(GoogleProfile {
            subject: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
            email_verified: info.email_verified,
        })
    }
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().is_none_or(|alg| alg == "RS256")
            && self.key_use.as_deref().is_none_or(|u| u == "sig")
    }
}

#[derive(Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn signing_keys(jwks: Jwks) -> KeySet {
    jwks.keys
        .into_iter()
        .filter(Jwk::is_rs256_signing_key)
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(kid = %jwk.kid, error = %e, "Ignoring malformed Google key");
                None
            }
        })
        .collect()
}

/// Google sends `email_verified` as a bool or as `"true"`/`"false"`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// `max-age` seconds from a `Cache-Control` value.
fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse()
            .ok()
            .map(Duration::from_secs)
    })
}
