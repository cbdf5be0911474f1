// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: the narrow persistence interface used by auth.
//!
//! Implementations:
//! - [`MemoryUserStore`] (development and tests)
//! - [`PgUserStore`] (PostgreSQL via sqlx)
//!
//! [`TimeoutStore`] wraps either one so every call is bounded.

pub mod memory;
pub mod postgres;
pub mod timeout;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use timeout::TimeoutStore;

use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;
use uuid::Uuid;

/// Largest page size accepted by [`UserStore::list_users`].
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Store-level failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("email or Google account already registered")]
    Conflict,

    #[error("store operation timed out: {0}")]
    Timeout(&'static str),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Admin listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    /// Case-insensitive substring matched against email and name
    pub search: Option<String>,
    /// 1-based page index
    pub page: u32,
    pub limit: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: 20,
        }
    }
}

impl UserQuery {
    /// Clamp page to >= 1 and limit to 1..=50, and drop blank searches.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self.search = self
            .search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of users, newest first.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: u64,
}

/// Persistence operations the auth core depends on.
///
/// Emails passed in are expected to be normalized already, but
/// implementations must still compare them case-insensitively.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up the account linked to a Google subject.
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with [`StoreError::Conflict`] on a duplicate
    /// email or Google subject.
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    /// Fails with [`StoreError::NotFound`] if no such user exists.
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError>;

    /// Fails with [`StoreError::NotFound`] if no such user exists.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, StoreError>;

    /// Connection health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_normalization_clamps_bounds() {
        let q = UserQuery {
            search: Some("   ".to_string()),
            page: 0,
            limit: 500,
        }
        .normalized();

        assert_eq!(q.search, None);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, MAX_PAGE_LIMIT);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn query_offset_uses_one_based_pages() {
        let q = UserQuery {
            search: Some(" Alice ".to_string()),
            page: 3,
            limit: 10,
        }
        .normalized();

        assert_eq!(q.search.as_deref(), Some("alice"));
        assert_eq!(q.offset(), 20);
    }
}
