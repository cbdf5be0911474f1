// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod authenticator;
pub mod cookies;
pub mod credentials;
pub mod google;
pub mod password;
pub mod token;

pub use authenticator::{Authenticator, RefreshedAccess, TokenSource};
pub use cookies::{SessionCookies, ACCESS_COOKIE, REFRESH_COOKIE};
pub use credentials::{
    CredentialService, GoogleCredential, GoogleLoginRequest, IssuedSession, LoginRequest,
    RegisterRequest,
};
pub use google::{
    GoogleEndpoints, GoogleError, GoogleIdentityProvider, GoogleProfile, GoogleVerifier,
};
pub use password::PasswordHasher;
pub use token::{Claims, TokenCodec, TokenError};
