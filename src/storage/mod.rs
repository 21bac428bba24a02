//! Persistence seams for accounts and issued tokens.
//!
//! Handlers and the auth core only talk to the [`AccountStore`] and
//! [`TokenStore`] traits. Production wiring uses [`postgres::PgStore`]; unit
//! tests run against the in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;
#[cfg(test)]
mod test_db;

/// Which profile table a record lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Adopter,
    Shelter,
}

impl ProfileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adopter => "adopter",
            Self::Shelter => "shelter",
        }
    }

    /// Capitalized name used in client-facing messages.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Adopter => "Adopter",
            Self::Shelter => "Shelter",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The profile a user owns, folded from the two nullable associations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Account {
    Adopter(Uuid),
    Shelter(Uuid),
}

impl Account {
    /// Adopter wins when both associations are populated; `None` when neither is.
    #[must_use]
    pub fn from_associations(adopter_id: Option<Uuid>, shelter_id: Option<Uuid>) -> Option<Self> {
        match (adopter_id, shelter_id) {
            (Some(id), _) => Some(Self::Adopter(id)),
            (None, Some(id)) => Some(Self::Shelter(id)),
            (None, None) => None,
        }
    }

    #[must_use]
    pub const fn kind(self) -> ProfileKind {
        match self {
            Self::Adopter(_) => ProfileKind::Adopter,
            Self::Shelter(_) => ProfileKind::Shelter,
        }
    }

    #[must_use]
    pub const fn id(self) -> Uuid {
        match self {
            Self::Adopter(id) | Self::Shelter(id) => id,
        }
    }
}

/// Identity row as needed by the login paths.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub account: Option<Account>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Adopter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub description: String,
    pub house_type: String,
    pub has_pets: bool,
    pub has_children: bool,
    pub time_at_home: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Shelter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub description: String,
    pub phone_number: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Validated adopter signup; the password is already hashed.
#[derive(Clone, Debug)]
pub struct NewAdopter {
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub description: String,
    pub house_type: String,
    pub has_pets: bool,
    pub has_children: bool,
    pub time_at_home: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl NewAdopter {
    #[must_use]
    pub fn into_adopter(self, id: Uuid, user_id: Uuid) -> Adopter {
        Adopter {
            id,
            user_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            description: self.description,
            house_type: self.house_type,
            has_pets: self.has_pets,
            has_children: self.has_children,
            time_at_home: self.time_at_home,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            google_id: self.google_id,
        }
    }
}

/// Validated shelter signup; the password is already hashed.
#[derive(Clone, Debug)]
pub struct NewShelter {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub description: String,
    pub phone_number: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewShelter {
    #[must_use]
    pub fn into_shelter(self, id: Uuid, user_id: Uuid) -> Shelter {
        Shelter {
            id,
            user_id,
            email: self.email,
            name: self.name,
            description: self.description,
            phone_number: self.phone_number,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Partial adopter update. `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct AdopterChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub description: Option<String>,
    pub house_type: Option<String>,
    pub has_pets: Option<bool>,
    pub has_children: Option<bool>,
    pub time_at_home: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl AdopterChanges {
    pub(crate) fn apply(&self, adopter: &mut Adopter) {
        if let Some(email) = &self.email {
            adopter.email.clone_from(email);
        }
        if let Some(value) = &self.first_name {
            adopter.first_name.clone_from(value);
        }
        if let Some(value) = &self.last_name {
            adopter.last_name.clone_from(value);
        }
        if let Some(value) = self.age {
            adopter.age = value;
        }
        if let Some(value) = &self.description {
            adopter.description.clone_from(value);
        }
        if let Some(value) = &self.house_type {
            adopter.house_type.clone_from(value);
        }
        if let Some(value) = self.has_pets {
            adopter.has_pets = value;
        }
        if let Some(value) = self.has_children {
            adopter.has_children = value;
        }
        if let Some(value) = self.time_at_home {
            adopter.time_at_home = value;
        }
        if let Some(value) = self.latitude {
            adopter.latitude = value;
        }
        if let Some(value) = self.longitude {
            adopter.longitude = value;
        }
        if let Some(value) = &self.address {
            adopter.address.clone_from(value);
        }
    }
}

/// Partial shelter update. `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct ShelterChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ShelterChanges {
    pub(crate) fn apply(&self, shelter: &mut Shelter) {
        if let Some(email) = &self.email {
            shelter.email.clone_from(email);
        }
        if let Some(value) = &self.name {
            shelter.name.clone_from(value);
        }
        if let Some(value) = &self.description {
            shelter.description.clone_from(value);
        }
        if let Some(value) = &self.phone_number {
            shelter.phone_number.clone_from(value);
        }
        if let Some(value) = &self.address {
            shelter.address.clone_from(value);
        }
        if let Some(value) = self.latitude {
            shelter.latitude = value;
        }
        if let Some(value) = self.longitude {
            shelter.longitude = value;
        }
    }
}

/// Unique column a write collided with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Taken {
    Email,
    GoogleAccount,
}

impl Taken {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Email => "Email already registered",
            Self::GoogleAccount => "Google account already registered",
        }
    }
}

/// Result of a write that can collide with a unique constraint.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Written(T),
    NotFound,
    Conflict(Taken),
}

/// Persisted bearer token row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: Uuid,
    pub content: String,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: &TokenRecord) -> Result<()>;

    async fn contains(&self, content: &str) -> Result<bool>;

    /// Returns the number of deleted rows (0 when already gone).
    async fn delete(&self, content: &str) -> Result<u64>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Liveness check backing `/health`.
    async fn ping(&self) -> Result<()>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Look up the user whose adopter profile carries this Google subject id.
    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>>;

    async fn adopter(&self, id: Uuid) -> Result<Option<Adopter>>;

    async fn shelter(&self, id: Uuid) -> Result<Option<Shelter>>;

    async fn list_adopters(&self) -> Result<Vec<Adopter>>;

    async fn list_shelters(&self) -> Result<Vec<Shelter>>;

    async fn create_adopter(&self, adopter: NewAdopter) -> Result<WriteOutcome<Adopter>>;

    async fn create_shelter(&self, shelter: NewShelter) -> Result<WriteOutcome<Shelter>>;

    async fn update_adopter(
        &self,
        id: Uuid,
        changes: AdopterChanges,
    ) -> Result<WriteOutcome<Adopter>>;

    async fn update_shelter(
        &self,
        id: Uuid,
        changes: ShelterChanges,
    ) -> Result<WriteOutcome<Shelter>>;

    /// Deletes the owning user; the profile goes with it.
    async fn delete_adopter(&self, id: Uuid) -> Result<bool>;

    async fn delete_shelter(&self, id: Uuid) -> Result<bool>;
}
