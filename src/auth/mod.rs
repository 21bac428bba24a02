//! Authentication core.
//!
//! Flow Overview:
//! 1) `password` checks a submitted password against the stored Argon2 hash.
//! 2) `token` signs `{subject, role}` into a bearer token and keeps a row per
//!    issued token so logout can revoke it before it expires.
//! 3) `identity` asks Google who an ID token belongs to.
//! 4) `service` ties them together for login, Google login, profile and logout.
//!
//! Roles are never stored on the user row. They are derived from which
//! profile the user owns, except `admin`, which only exists inside tokens
//! minted by the `admin-token` CLI action.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::storage::{Account, ProfileKind};

pub mod identity;
pub mod password;
pub mod service;
pub mod token;

pub use identity::{ExternalIdentity, GoogleConfig, GoogleIdentityProvider, IdentityProvider};
pub use service::{AuthService, ExternalLogin, LoginOutcome, Profile};
pub use token::{TokenConfig, TokenIssuer};

/// Subject used in admin tokens; admins have no profile row.
pub const ADMIN_SUBJECT: &str = "admin";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Adopter,
    Shelter,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adopter => "adopter",
            Self::Shelter => "shelter",
            Self::Admin => "admin",
        }
    }

    /// Profile table backing this role; admins have none.
    #[must_use]
    pub const fn profile_kind(self) -> Option<ProfileKind> {
        match self {
            Self::Adopter => Some(ProfileKind::Adopter),
            Self::Shelter => Some(ProfileKind::Shelter),
            Self::Admin => None,
        }
    }
}

impl From<ProfileKind> for Role {
    fn from(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Adopter => Self::Adopter,
            ProfileKind::Shelter => Self::Shelter,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Who a resolved bearer token speaks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    #[must_use]
    pub fn for_account(account: Account) -> Self {
        Self::new(account.id().to_string(), account.kind().into())
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
