//! Adopter CRUD under `/api/v1/adopter`.
//!
//! Signup is public and answers with a token so the new adopter is logged in
//! straight away. Shelters may read adopters; only the adopter itself (or an
//! admin) may change or delete the record.

use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{require_auth, require_role, require_self},
    check_email, check_non_negative, check_not_empty, check_optional, check_password,
    check_range, json_body, parse_id, ADULT_AGE, LATITUDE, LONGITUDE,
};
use crate::api::envelope::{Envelope, Reply};
use crate::auth::{normalize_email, password::hash_password_blocking, AuthService, Role};
use crate::error::{Error, Result};
use crate::storage::{AdopterChanges, NewAdopter, ProfileKind, WriteOutcome};

const KIND: ProfileKind = ProfileKind::Adopter;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAdopterRequest {
    pub email: String,
    /// Required unless `google_token` is given.
    #[serde(default)]
    pub password: Option<String>,
    /// Google ID token; the linked Google account is resolved server side.
    #[serde(default)]
    pub google_token: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub description: String,
    pub house_type: String,
    pub has_pets: bool,
    pub has_children: bool,
    /// Hours per day someone is at home.
    pub time_at_home: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl CreateAdopterRequest {
    fn validate(&self) -> Result<()> {
        check_email(&self.email)?;
        match (&self.password, &self.google_token) {
            (Some(password), _) => check_password(password)?,
            (None, Some(google_token)) => check_not_empty("google_token", google_token)?,
            (None, None) => {
                return Err(Error::Validation(r#""password" is required"#.to_string()));
            }
        }
        check_not_empty("first_name", &self.first_name)?;
        check_not_empty("last_name", &self.last_name)?;
        check_range("age", self.age, &ADULT_AGE)?;
        check_not_empty("description", &self.description)?;
        check_not_empty("house_type", &self.house_type)?;
        check_non_negative("time_at_home", self.time_at_home)?;
        check_range("latitude", self.latitude, &LATITUDE)?;
        check_range("longitude", self.longitude, &LONGITUDE)?;
        check_not_empty("address", &self.address)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAdopterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
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

impl UpdateAdopterRequest {
    fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.age.is_none()
            && self.description.is_none()
            && self.house_type.is_none()
            && self.has_pets.is_none()
            && self.has_children.is_none()
            && self.time_at_home.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.address.is_none()
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation("No updates provided".to_string()));
        }
        check_optional(self.email.as_deref(), check_email)?;
        check_optional(self.password.as_deref(), check_password)?;
        check_optional(self.first_name.as_deref(), |v| check_not_empty("first_name", v))?;
        check_optional(self.last_name.as_deref(), |v| check_not_empty("last_name", v))?;
        check_optional(self.age.as_ref(), |v| check_range("age", *v, &ADULT_AGE))?;
        check_optional(self.description.as_deref(), |v| check_not_empty("description", v))?;
        check_optional(self.house_type.as_deref(), |v| check_not_empty("house_type", v))?;
        check_optional(self.time_at_home.as_ref(), |v| check_non_negative("time_at_home", *v))?;
        check_optional(self.latitude.as_ref(), |v| check_range("latitude", *v, &LATITUDE))?;
        check_optional(self.longitude.as_ref(), |v| check_range("longitude", *v, &LONGITUDE))?;
        check_optional(self.address.as_deref(), |v| check_not_empty("address", v))
    }

    async fn into_changes(self) -> Result<AdopterChanges> {
        let password_hash = match self.password {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };
        Ok(AdopterChanges {
            email: self.email.as_deref().map(normalize_email),
            password_hash,
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
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/adopter",
    responses(
        (status = 200, description = "All adopters", body = Envelope),
        (status = 401, description = "Not an admin", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "adopter"
)]
pub async fn list(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[])?;

    let adopters = auth.accounts().list_adopters().await?;
    Reply::ok("Adopters retrieved successfully!").with_data(&adopters)
}

#[utoipa::path(
    get,
    path = "/api/v1/adopter/{id}",
    params(("id" = String, Path, description = "Adopter id (UUID)")),
    responses(
        (status = 200, description = "The adopter", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 401, description = "Not a shelter or admin", body = Envelope),
        (status = 404, description = "No such adopter", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "adopter"
)]
pub async fn get(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Shelter])?;
    let id = parse_id(&id)?;

    let adopter = auth
        .accounts()
        .adopter(id)
        .await?
        .ok_or_else(|| Error::not_found(KIND, id))?;
    Reply::ok("Adopter retrieved successfully!").with_data(&adopter)
}

#[utoipa::path(
    post,
    path = "/api/v1/adopter",
    request_body = CreateAdopterRequest,
    responses(
        (status = 201, description = "Created; `data` is the new id", body = Envelope),
        (status = 400, description = "Invalid fields", body = Envelope),
        (status = 401, description = "Google token not valid", body = Envelope),
        (status = 409, description = "Email or Google account already registered", body = Envelope)
    ),
    tag = "adopter"
)]
#[instrument(skip_all)]
pub async fn create(
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<CreateAdopterRequest>, JsonRejection>,
) -> Result<Reply> {
    let request = json_body(payload)?;
    request.validate()?;

    let google_id = match request.google_token.as_deref() {
        Some(google_token) => Some(auth.resolve_external(google_token).await?.google_id),
        None => None,
    };

    let password_hash = match request.password {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let new_adopter = NewAdopter {
        email: normalize_email(&request.email),
        password_hash,
        google_id,
        first_name: request.first_name,
        last_name: request.last_name,
        age: request.age,
        description: request.description,
        house_type: request.house_type,
        has_pets: request.has_pets,
        has_children: request.has_children,
        time_at_home: request.time_at_home,
        latitude: request.latitude,
        longitude: request.longitude,
        address: request.address,
    };

    let adopter = match auth.accounts().create_adopter(new_adopter).await? {
        WriteOutcome::Written(adopter) => adopter,
        WriteOutcome::Conflict(taken) => {
            return Err(Error::Conflict(taken.message().to_string()));
        }
        WriteOutcome::NotFound => {
            return Err(anyhow!("adopter insert reported a missing row").into());
        }
    };

    let token = auth
        .tokens()
        .issue(&adopter.id.to_string(), Role::Adopter)
        .await?;

    info!(adopter_id = %adopter.id, "adopter created");

    Reply::created("Adopter created succesfully!")
        .with_token(token)
        .with_data(&adopter.id)
}

#[utoipa::path(
    put,
    path = "/api/v1/adopter/{id}",
    params(("id" = String, Path, description = "Adopter id (UUID)")),
    request_body = UpdateAdopterRequest,
    responses(
        (status = 200, description = "Updated", body = Envelope),
        (status = 400, description = "Invalid fields or malformed id", body = Envelope),
        (status = 401, description = "Not this adopter or an admin", body = Envelope),
        (status = 404, description = "No such adopter", body = Envelope),
        (status = 409, description = "Email already registered", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "adopter"
)]
pub async fn update(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<UpdateAdopterRequest>, JsonRejection>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Adopter])?;
    let id = parse_id(&id)?;
    require_self(&identity, id)?;

    let request = json_body(payload)?;
    request.validate()?;
    let changes = request.into_changes().await?;

    match auth.accounts().update_adopter(id, changes).await? {
        WriteOutcome::Written(adopter) => {
            Reply::ok("Adopter updated succesfully!").with_data(&adopter)
        }
        WriteOutcome::NotFound => Err(Error::not_found(KIND, id)),
        WriteOutcome::Conflict(taken) => Err(Error::Conflict(taken.message().to_string())),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/adopter/{id}",
    params(("id" = String, Path, description = "Adopter id (UUID)")),
    responses(
        (status = 200, description = "Deleted together with its user", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 401, description = "Not this adopter or an admin", body = Envelope),
        (status = 404, description = "No such adopter", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "adopter"
)]
pub async fn delete(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Adopter])?;
    let id = parse_id(&id)?;
    require_self(&identity, id)?;

    if !auth.accounts().delete_adopter(id).await? {
        return Err(Error::not_found(KIND, id));
    }

    info!(adopter_id = %id, "adopter deleted");

    Ok(Reply::ok("Adopter deleted succesfully!"))
}
