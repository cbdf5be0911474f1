// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! bcrypt hashing on the blocking pool with a deadline.

use std::sync::LazyLock;
use std::time::Duration;

/// bcrypt work factor for new hashes.
pub const BCRYPT_COST: u32 = 10;

/// Hash compared against when an account has no password, so a missing
/// account costs the same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("fitx-dummy-password", BCRYPT_COST).ok());

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing timed out")]
    Timeout,

    #[error("password hashing failed: {0}")]
    Failed(String),
}

/// Runs bcrypt work off the async executor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    timeout: Duration,
}

impl PasswordHasher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cost: BCRYPT_COST,
            timeout,
        }
    }

    /// Lower cost for tests only; production always uses [`BCRYPT_COST`].
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_owned();
        let cost = self.cost;
        self.run(move || bcrypt::hash(password, cost)).await
    }

    /// Compare `password` against `hash`.
    ///
    /// With no hash, a dummy comparison still runs and the result is `false`.
    pub async fn verify(&self, password: &str, hash: Option<&str>) -> Result<bool, PasswordError> {
        let password = password.to_owned();
        let hash = hash.map(str::to_owned);
        let real = hash.is_some();

        // DUMMY_HASH is built lazily, so it must be touched on the blocking pool.
        let matched = self
            .run(move || match hash.as_deref().or_else(|| DUMMY_HASH.as_deref()) {
                Some(hash) => bcrypt::verify(password, hash),
                None => Ok(false),
            })
            .await?;
        Ok(real && matched)
    }

    async fn run<T, F>(&self, work: F) -> Result<T, PasswordError>
    where
        F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(work)).await {
            Err(_) => {
                tracing::warn!(
                    budget_ms = self.timeout.as_millis() as u64,
                    "Password hashing timed out"
                );
                Err(PasswordError::Timeout)
            }
            Ok(Err(join)) => Err(PasswordError::Failed(join.to_string())),
            Ok(Ok(result)) => result.map_err(|e| PasswordError::Failed(e.to_string())),
        }
    }
}
