// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store decorator that bounds every call with a deadline.

use super::{StoreError, UserPage, UserQuery, UserStore};
use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Wraps a [`UserStore`] and turns hangs into [`StoreError::Timeout`].
#[derive(Clone)]
pub struct TimeoutStore {
    inner: Arc<dyn UserStore>,
    budget: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn UserStore>, budget: Duration) -> Self {
        Self { inner, budget }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.budget, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation = op,
                    budget_ms = self.budget.as_millis() as u64,
                    "Credential store call timed out"
                );
                Err(StoreError::Timeout(op))
            }
        }
    }
}

#[async_trait]
impl UserStore for TimeoutStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.bounded("find_by_email", self.inner.find_by_email(email))
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.bounded("find_by_id", self.inner.find_by_id(id)).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        self.bounded("find_by_google_id", self.inner.find_by_google_id(google_id))
            .await
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.bounded("create_user", self.inner.create_user(new)).await
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        self.bounded("update_user", self.inner.update_user(id, patch))
            .await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.bounded("delete_user", self.inner.delete_user(id)).await
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        self.bounded("list_users", self.inner.list_users(query)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.inner.ping()).await
    }
}
