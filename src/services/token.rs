// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed session tokens.
//!
//! Access and refresh tokens are both HS256 JWTs carrying `{sub, iat, exp}`,
//! but they are signed with different secrets so one class can never be
//! accepted as the other.

use crate::config::Config;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Clock skew tolerated when checking `exp`.
const LEEWAY_SECS: u64 = 30;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::InvalidSubject)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id")]
    InvalidSubject,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err),
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// Issues and verifies access and refresh tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<Inner>,
}

struct Inner {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = LEEWAY_SECS;

        Self {
            inner: Arc::new(Inner {
                access: KeyPair::new(access_secret, access_ttl),
                refresh: KeyPair::new(refresh_secret, refresh_ttl),
                validation,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_access_secret,
            &config.jwt_refresh_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn sign_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        sign_at(&self.inner.access, user_id, now_unix_secs())
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        sign_at(&self.inner.refresh, user_id, now_unix_secs())
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.inner.access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.inner.refresh, token)
    }

    pub fn access_ttl(&self) -> Duration {
        self.inner.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.inner.refresh.ttl
    }

    fn verify(&self, keys: &KeyPair, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &keys.decoding, &self.inner.validation)?;
        Ok(data.claims)
    }
}

fn sign_at(keys: &KeyPair, user_id: Uuid, now: u64) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now.saturating_add(keys.ttl.as_secs()),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(TokenError::Signing)
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
