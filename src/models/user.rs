// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Account role used by the access-control gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Basic,
    Pro,
    Elite,
}

/// Billing cadence of a paid subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionBilling {
    Monthly,
    Yearly,
}

/// How the account was first created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthProvider {
    #[default]
    Local,
    Google,
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(Role, "role", { User => "USER", Admin => "ADMIN" });
string_enum!(SubscriptionPlan, "plan", {
    Free => "FREE",
    Basic => "BASIC",
    Pro => "PRO",
    Elite => "ELITE",
});
string_enum!(SubscriptionBilling, "billing", { Monthly => "MONTHLY", Yearly => "YEARLY" });
string_enum!(AuthProvider, "provider", { Local => "LOCAL", Google => "GOOGLE" });

/// Full user record as held by the credential store.
///
/// Never serialize this type to clients; use [`PublicUser`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Trimmed, lower-cased, unique
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// bcrypt hash; `None` for accounts created through Google sign-in
    pub password_hash: Option<String>,
    pub role: Role,
    pub active: bool,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_billing: Option<SubscriptionBilling>,
    pub subscription_since: Option<DateTime<Utc>>,
    pub provider: AuthProvider,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh record from an insert payload with store defaults.
    pub fn from_new(new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&new.email),
            name: new.name,
            avatar_url: new.avatar_url,
            password_hash: new.password_hash,
            role: Role::default(),
            active: true,
            subscription_plan: SubscriptionPlan::default(),
            subscription_billing: None,
            subscription_since: None,
            provider: new.provider,
            google_id: new.google_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place and bump `updated_at`.
    pub fn apply(&mut self, patch: UserPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = avatar_url;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(plan) = patch.subscription_plan {
            self.subscription_plan = plan;
        }
        if let Some(billing) = patch.subscription_billing {
            self.subscription_billing = billing;
        }
        if let Some(since) = patch.subscription_since {
            self.subscription_since = Some(since);
        }
        if let Some(provider) = patch.provider {
            self.provider = provider;
        }
        if let Some(google_id) = patch.google_id {
            self.google_id = Some(google_id);
        }
        self.updated_at = now;
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

/// Insert payload for a new user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub provider: AuthProvider,
    pub google_id: Option<String>,
}

/// Partial update. `None` leaves a field untouched; for nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub subscription_billing: Option<Option<SubscriptionBilling>>,
    pub subscription_since: Option<DateTime<Utc>>,
    pub provider: Option<AuthProvider>,
    pub google_id: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == UserPatch::default()
    }
}

/// Client-safe view of a user. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub active: bool,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_billing: Option<SubscriptionBilling>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
            active: user.active,
            subscription_plan: user.subscription_plan,
            subscription_billing: user.subscription_billing,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser::from(&user)
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::from_new(
            NewUser {
                email: "  Alice@Example.COM ".to_string(),
                name: Some("Alice".to_string()),
                password_hash: Some("$2b$10$hash".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_user_gets_defaults_and_normalized_email() {
        let user = sample_user();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::User);
        assert!(user.active);
        assert_eq!(user.subscription_plan, SubscriptionPlan::Free);
        assert_eq!(user.subscription_billing, None);
        assert_eq!(user.provider, AuthProvider::Local);
    }

    #[test]
    fn public_view_has_no_password_hash() {
        let json = serde_json::to_value(sample_user().to_public()).unwrap();
        let obj = json.as_object().unwrap();

        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("password_hash"));
        assert_eq!(obj["email"], "alice@example.com");
        assert_eq!(obj["role"], "USER");
        assert_eq!(obj["subscriptionPlan"], "FREE");
        assert_eq!(obj["subscriptionBilling"], serde_json::Value::Null);
        assert!(obj.contains_key("avatarUrl"));
        assert!(obj.contains_key("createdAt"));
    }

    #[test]
    fn patch_clears_nullable_fields() {
        let mut user = sample_user();
        user.subscription_billing = Some(SubscriptionBilling::Yearly);

        let before = user.updated_at;
        user.apply(
            UserPatch {
                name: Some(None),
                subscription_billing: Some(None),
                role: Some(Role::Admin),
                ..Default::default()
            },
            before + chrono::Duration::seconds(1),
        );

        assert_eq!(user.name, None);
        assert_eq!(user.subscription_billing, None);
        assert_eq!(user.role, Role::Admin);
        assert!(user.updated_at > before);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("ELITE".parse::<SubscriptionPlan>().unwrap(), SubscriptionPlan::Elite);
        assert_eq!(
            " yearly ".parse::<SubscriptionBilling>().unwrap(),
            SubscriptionBilling::Yearly
        );
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(UserPatch::default().is_empty());
        assert!(!UserPatch {
            active: Some(false),
            ..Default::default()
        }
        .is_empty());
    }
}
