// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory credential store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite.

use super::{StoreError, UserPage, UserQuery, UserStore};
use crate::models::{normalize_email, NewUser, User, UserPatch};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Credential store backed by concurrent hash maps.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    /// normalized email -> user id
    emails: DashMap<String, Uuid>,
    /// Google subject -> user id
    google_ids: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Claim `google_id` for `id`; false if another user holds it.
    fn reserve_google_id(&self, google_id: &str, id: Uuid) -> bool {
        match self.google_ids.entry(google_id.to_string()) {
            Entry::Occupied(owner) => *owner.get() == id,
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }
}

fn matches_search(user: &User, needle: &str) -> bool {
    user.email.contains(needle)
        || user
            .name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(needle))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let Some(id) = self.emails.get(&email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.google_ids.get(google_id).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let user = User::from_new(new, chrono::Utc::now());

        // Reserve the email first so two concurrent inserts cannot both win.
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }

        if let Some(google_id) = &user.google_id {
            if !self.reserve_google_id(google_id, user.id) {
                self.emails.remove(&user.email);
                return Err(StoreError::Conflict);
            }
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        let previous = self
            .users
            .get(&id)
            .map(|user| user.google_id.clone())
            .ok_or(StoreError::NotFound)?;

        if let Some(google_id) = &patch.google_id {
            if previous.as_ref() != Some(google_id) && !self.reserve_google_id(google_id, id) {
                return Err(StoreError::Conflict);
            }
        }

        let Some(mut entry) = self.users.get_mut(&id) else {
            if let Some(google_id) = &patch.google_id {
                self.google_ids.remove_if(google_id, |_, owner| *owner == id);
            }
            return Err(StoreError::NotFound);
        };
        entry.apply(patch, chrono::Utc::now());
        let updated = entry.clone();
        drop(entry);

        if let Some(old) = previous.filter(|old| updated.google_id.as_ref() != Some(old)) {
            self.google_ids.remove_if(&old, |_, owner| *owner == id);
        }
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let (_, user) = self.users.remove(&id).ok_or(StoreError::NotFound)?;
        self.emails.remove(&user.email);
        if let Some(google_id) = &user.google_id {
            self.google_ids.remove_if(google_id, |_, owner| *owner == id);
        }
        Ok(())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let query = query.clone().normalized();

        let mut matched: Vec<User> = self
            .users
            .iter()
            .filter(|entry| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|needle| matches_search(entry.value(), needle))
            })
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();

        Ok(UserPage { items, total })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
