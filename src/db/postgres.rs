// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL credential store (sqlx).

use super::{StoreError, UserPage, UserQuery, UserStore};
use crate::config::Timeouts;
use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_create_users.sql");
const MAX_CONNECTIONS: u32 = 10;
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

const USER_COLUMNS: &str = "id, email, name, avatar_url, password_hash, role, active, \
     subscription_plan, subscription_billing, subscription_since, provider, google_id, \
     created_at, updated_at";

macro_rules! select_users {
    ($tail:literal) => {
        concat!(
            "SELECT id, email, name, avatar_url, password_hash, role, active, ",
            "subscription_plan, subscription_billing, subscription_since, provider, google_id, ",
            "created_at, updated_at FROM users ",
            $tail
        )
    };
}

/// Search predicate shared by the listing and count queries.
const SEARCH_FILTER: &str =
    "($1::text IS NULL OR LOWER(email) LIKE $1 OR LOWER(COALESCE(name, '')) LIKE $1)";

/// Raw row as stored; enum columns are TEXT.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    avatar_url: Option<String>,
    password_hash: Option<String>,
    role: String,
    active: bool,
    subscription_plan: String,
    subscription_billing: Option<String>,
    subscription_since: Option<DateTime<Utc>>,
    provider: String,
    google_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::models::user::ParseEnumError| {
            StoreError::Backend(format!("corrupt user row {}: {e}", row.id))
        };

        Ok(User {
            id: row.id,
            email: row.email.clone(),
            name: row.name.clone(),
            avatar_url: row.avatar_url.clone(),
            password_hash: row.password_hash.clone(),
            role: row.role.parse().map_err(corrupt)?,
            active: row.active,
            subscription_plan: row.subscription_plan.parse().map_err(corrupt)?,
            subscription_billing: row
                .subscription_billing
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            subscription_since: row.subscription_since,
            provider: row.provider.parse().map_err(corrupt)?,
            google_id: row.google_id.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_sqlx(op: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        sqlx::Error::PoolTimedOut => StoreError::Timeout(op),
        other => {
            tracing::error!(operation = op, error = %other, "PostgreSQL error");
            StoreError::Backend(other.to_string())
        }
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Credential store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a lazily-connecting pool.
    ///
    /// No connection is opened until the first query, so a cold database
    /// does not block startup; acquisition is bounded by `timeouts.connect`.
    pub fn connect_lazy(database_url: &str, timeouts: &Timeouts) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(0)
            .acquire_timeout(timeouts.connect)
            .idle_timeout(IDLE_TIMEOUT)
            .connect_lazy(database_url)
            .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {e}")))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table and its indexes if missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("migrate", e))?;
        tracing::info!("User schema ready");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(select_users!("WHERE LOWER(email) = LOWER(TRIM($1))"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_by_email", e))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(select_users!("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_by_id", e))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(select_users!("WHERE google_id = $1"))
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_by_google_id", e))?
            .map(User::try_from)
            .transpose()
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let user = User::from_new(new, Utc::now());

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO users (id, email, name, avatar_url, password_hash, role, active, \
             subscription_plan, subscription_billing, subscription_since, provider, google_id, \
             created_at, updated_at) ",
        );
        qb.push_values(std::iter::once(&user), |mut row, u| {
            row.push_bind(u.id)
                .push_bind(u.email.clone())
                .push_bind(u.name.clone())
                .push_bind(u.avatar_url.clone())
                .push_bind(u.password_hash.clone())
                .push_bind(u.role.as_str())
                .push_bind(u.active)
                .push_bind(u.subscription_plan.as_str())
                .push_bind(u.subscription_billing.map(|b| b.as_str()))
                .push_bind(u.subscription_since)
                .push_bind(u.provider.as_str())
                .push_bind(u.google_id.clone())
                .push_bind(u.created_at)
                .push_bind(u.updated_at);
        });
        qb.push(" RETURNING ").push(USER_COLUMNS);

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("create_user", e))?;

        User::try_from(row)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(name) = patch.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(avatar_url) = patch.avatar_url {
            qb.push(", avatar_url = ").push_bind(avatar_url);
        }
        if let Some(role) = patch.role {
            qb.push(", role = ").push_bind(role.as_str());
        }
        if let Some(active) = patch.active {
            qb.push(", active = ").push_bind(active);
        }
        if let Some(plan) = patch.subscription_plan {
            qb.push(", subscription_plan = ").push_bind(plan.as_str());
        }
        if let Some(billing) = patch.subscription_billing {
            qb.push(", subscription_billing = ")
                .push_bind(billing.map(|b| b.as_str()));
        }
        if let Some(since) = patch.subscription_since {
            qb.push(", subscription_since = ").push_bind(since);
        }
        if let Some(provider) = patch.provider {
            qb.push(", provider = ").push_bind(provider.as_str());
        }
        if let Some(google_id) = patch.google_id {
            qb.push(", google_id = ").push_bind(google_id);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("update_user", e))?
            .ok_or(StoreError::NotFound)?;

        User::try_from(row)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let query = query.clone().normalized();
        let pattern = query.search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {SEARCH_FILTER} \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(query.limit))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list_users", e))?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {SEARCH_FILTER}"))
                .bind(pattern.as_deref())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx("count_users", e))?;

        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserPage {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("ping", e))?;
        Ok(())
    }
}
