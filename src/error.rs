// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;
use validator::ValidationErrors;

/// One failed field check, reported back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub path: Vec<String>,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: vec![field.into()],
            message: message.into(),
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input")]
    Validation(Vec<FieldIssue>),

    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("No refresh token")]
    NoRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Google authentication failed: {0}")]
    GoogleAuthFailed(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Account is inactive")]
    Inactive,

    #[error("Account is linked to a different Google identity")]
    GoogleAccountMismatch,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Email already registered")]
    EmailExists,

    #[error("Service is busy, please retry")]
    DbTimeout,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable error code sent as `error`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest { code, .. } => code,
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::NoRefreshToken => "NO_REFRESH_TOKEN",
            AppError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::GoogleAuthFailed(_) => "GOOGLE_AUTH_FAILED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::Inactive => "INACTIVE",
            AppError::GoogleAccountMismatch => "GOOGLE_ACCOUNT_MISMATCH",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::EmailExists => "EMAIL_EXISTS",
            AppError::DbTimeout => "DB_TIMEOUT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized
            | AppError::InvalidCredentials
            | AppError::NoRefreshToken
            | AppError::InvalidRefreshToken
            | AppError::Unauthenticated
            | AppError::GoogleAuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::EmailNotVerified
            | AppError::Inactive
            | AppError::GoogleAccountMismatch => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailExists => StatusCode::CONFLICT,
            AppError::DbTimeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message. Upstream and internal details stay in the logs.
    fn public_message(&self) -> Cow<'static, str> {
        match self {
            AppError::GoogleAuthFailed(_) => Cow::Borrowed("Google authentication failed"),
            AppError::Database(_) | AppError::Internal(_) => {
                Cow::Borrowed("Something went wrong")
            }
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<Vec<FieldIssue>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
            AppError::GoogleAuthFailed(reason) => {
                tracing::warn!(reason = %reason, "Google authentication failed")
            }
            AppError::DbTimeout => tracing::warn!("Request failed on store timeout"),
            _ => {}
        }

        let status = self.status();
        let body = ErrorResponse {
            error: self.code(),
            message: self.public_message(),
            issues: match self {
                AppError::Validation(issues) => Some(issues),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("User not found".to_string()),
            StoreError::Conflict => AppError::EmailExists,
            StoreError::Timeout(_) => AppError::DbTimeout,
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request("INVALID_BODY", rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut issues: Vec<FieldIssue> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    FieldIssue::new(field.to_string(), message)
                })
            })
            .collect();
        issues.sort_by(|a, b| a.path.cmp(&b.path));
        AppError::Validation(issues)
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
