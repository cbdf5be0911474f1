// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration and login: password and Google.

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{normalize_email, AuthProvider, NewUser, PublicUser, User, UserPatch};
use crate::services::google::{GoogleIdentityProvider, GoogleProfile};
use crate::services::password::{PasswordError, PasswordHasher};
use crate::services::token::TokenCodec;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Body of `POST /auth/register`. Missing fields fail validation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl RegisterRequest {
    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        self
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of `POST /auth/google`. Exactly one token is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleLoginRequest {
    pub credential: Option<String>,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

/// A Google credential presented by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredential {
    IdToken(String),
    AccessToken(String),
}

impl GoogleCredential {
    /// `id_token` wins over `credential`, and either wins over `access_token`.
    pub fn from_request(req: GoogleLoginRequest) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        present(req.id_token)
            .or_else(|| present(req.credential))
            .map(GoogleCredential::IdToken)
            .or_else(|| present(req.access_token).map(GoogleCredential::AccessToken))
    }
}

/// Tokens issued on a successful login.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Verifies credentials and issues sessions.
#[derive(Clone)]
pub struct CredentialService {
    tokens: TokenCodec,
    store: Arc<dyn UserStore>,
    google: Arc<dyn GoogleIdentityProvider>,
    hasher: PasswordHasher,
    login_budget: Duration,
}

impl CredentialService {
    pub fn new(
        tokens: TokenCodec,
        store: Arc<dyn UserStore>,
        google: Arc<dyn GoogleIdentityProvider>,
        hasher: PasswordHasher,
        login_budget: Duration,
    ) -> Self {
        Self {
            tokens,
            store,
            google,
            hasher,
            login_budget,
        }
    }

    /// Create a local account. No session is issued.
    pub async fn register(&self, req: RegisterRequest) -> Result<PublicUser, AppError> {
        let req = req.normalized();
        req.validate()?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::EmailExists);
        }

        let password_hash = self.hasher.hash(&req.password).await.map_err(password_error)?;

        let user = self
            .store
            .create_user(NewUser {
                email: req.email,
                name: Some(req.name),
                password_hash: Some(password_hash),
                provider: AuthProvider::Local,
                ..Default::default()
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.to_public())
    }

    /// Password login, bounded end to end by the login budget.
    pub async fn login(&self, req: LoginRequest) -> Result<IssuedSession, AppError> {
        let req = LoginRequest {
            email: normalize_email(&req.email),
            password: req.password,
        };
        req.validate()?;

        match tokio::time::timeout(self.login_budget, self.check_password(&req)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    budget_ms = self.login_budget.as_millis() as u64,
                    "Login exceeded its time budget"
                );
                Err(AppError::DbTimeout)
            }
        }
    }

    async fn check_password(&self, req: &LoginRequest) -> Result<IssuedSession, AppError> {
        let user = self.store.find_by_email(&req.email).await?;
        let hash = user.as_ref().and_then(|u| u.password_hash.as_deref());

        let matched = self
            .hasher
            .verify(&req.password, hash)
            .await
            .map_err(password_error)?;

        let user = match user {
            Some(user) if matched => user,
            _ => {
                tracing::debug!("Password login rejected");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !user.active {
            return Err(AppError::Inactive);
        }

        tracing::info!(user_id = %user.id, "Password login");
        self.issue(&user)
    }

    /// Sign in with Google, creating or linking the account as needed.
    pub async fn login_with_google(
        &self,
        credential: GoogleCredential,
    ) -> Result<IssuedSession, AppError> {
        let profile = match &credential {
            GoogleCredential::IdToken(token) => self.google.verify_id_token(token).await,
            GoogleCredential::AccessToken(token) => self.google.fetch_userinfo(token).await,
        }
        .map_err(|e| AppError::GoogleAuthFailed(e.to_string()))?;

        let (google_id, email) = match (non_blank(&profile.subject), non_blank(&profile.email)) {
            (Some(sub), Some(email)) => (sub.to_string(), normalize_email(email)),
            _ => {
                return Err(AppError::bad_request(
                    "INVALID_GOOGLE_PAYLOAD",
                    "Google profile is missing email or subject",
                ))
            }
        };

        if profile.email_verified == Some(false) {
            return Err(AppError::EmailNotVerified);
        }

        // The subject is stable across Google email changes, so it wins.
        let user = match self.store.find_by_google_id(&google_id).await? {
            Some(user) => user,
            None => match self.store.find_by_email(&email).await? {
                None => self.create_google_user(email, google_id, &profile).await?,
                Some(user) => self.link_google_user(user, google_id, &profile).await?,
            },
        };

        if !user.active {
            return Err(AppError::Inactive);
        }

        tracing::info!(user_id = %user.id, "Google login");
        self.issue(&user)
    }

    async fn create_google_user(
        &self,
        email: String,
        google_id: String,
        profile: &GoogleProfile,
    ) -> Result<User, AppError> {
        let user = self
            .store
            .create_user(NewUser {
                email,
                name: non_blank(&profile.name).map(str::to_string),
                avatar_url: non_blank(&profile.picture).map(str::to_string),
                password_hash: None,
                provider: AuthProvider::Google,
                google_id: Some(google_id),
            })
            .await?;

        tracing::info!(user_id = %user.id, "Created user from Google profile");
        Ok(user)
    }

    async fn link_google_user(
        &self,
        user: User,
        google_id: String,
        profile: &GoogleProfile,
    ) -> Result<User, AppError> {
        match user.google_id.as_deref() {
            Some(existing) if existing == google_id => return Ok(user),
            Some(_) => {
                tracing::warn!(user_id = %user.id, "Google subject does not match linked account");
                return Err(AppError::GoogleAccountMismatch);
            }
            None => {}
        }

        // Linking takes over an existing account, so Google must vouch for
        // the address explicitly.
        if profile.email_verified != Some(true) {
            return Err(AppError::EmailNotVerified);
        }

        let avatar_url = match (&user.avatar_url, non_blank(&profile.picture)) {
            (None, Some(picture)) => Some(Some(picture.to_string())),
            _ => None,
        };

        let linked = self
            .store
            .update_user(
                user.id,
                UserPatch {
                    google_id: Some(google_id),
                    provider: Some(AuthProvider::Google),
                    avatar_url,
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %linked.id, "Linked Google identity to existing user");
        Ok(linked)
    }

    fn issue(&self, user: &User) -> Result<IssuedSession, AppError> {
        let access_token = self
            .tokens
            .sign_access(user.id)
            .map_err(|e| AppError::Internal(e.into()))?;
        let refresh_token = self
            .tokens
            .sign_refresh(user.id)
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(IssuedSession {
            access_token,
            refresh_token,
            user: user.to_public(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn password_error(err: PasswordError) -> AppError {
    match err {
        PasswordError::Timeout => AppError::DbTimeout,
        PasswordError::Failed(msg) => AppError::Internal(anyhow::anyhow!(msg)),
    }
}
