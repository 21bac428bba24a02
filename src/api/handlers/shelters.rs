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
    check_email, check_not_empty, check_optional, check_password, check_range, json_body,
    parse_id, LATITUDE, LONGITUDE,
};
use crate::api::envelope::{Envelope, Reply};
use crate::auth::{normalize_email, password::hash_password_blocking, AuthService, Role};
use crate::error::{Error, Result};
use crate::storage::{NewShelter, ProfileKind, ShelterChanges, WriteOutcome};

const KIND: ProfileKind = ProfileKind::Shelter;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateShelterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub description: String,
    pub phone_number: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CreateShelterRequest {
    fn validate(&self) -> Result<()> {
        check_email(&self.email)?;
        check_password(&self.password)?;
        check_not_empty("name", &self.name)?;
        check_not_empty("description", &self.description)?;
        check_not_empty("phone_number", &self.phone_number)?;
        check_not_empty("address", &self.address)?;
        check_range("latitude", self.latitude, &LATITUDE)?;
        check_range("longitude", self.longitude, &LONGITUDE)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateShelterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl UpdateShelterRequest {
    fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation("No updates provided".to_string()));
        }
        check_optional(self.email.as_deref(), check_email)?;
        check_optional(self.password.as_deref(), check_password)?;
        check_optional(self.name.as_deref(), |v| check_not_empty("name", v))?;
        check_optional(self.description.as_deref(), |v| check_not_empty("description", v))?;
        check_optional(self.phone_number.as_deref(), |v| check_not_empty("phone_number", v))?;
        check_optional(self.address.as_deref(), |v| check_not_empty("address", v))?;
        check_optional(self.latitude.as_ref(), |v| check_range("latitude", *v, &LATITUDE))?;
        check_optional(self.longitude.as_ref(), |v| check_range("longitude", *v, &LONGITUDE))
    }

    async fn into_changes(self) -> Result<ShelterChanges> {
        let password_hash = match self.password {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };
        Ok(ShelterChanges {
            email: self.email.as_deref().map(normalize_email),
            password_hash,
            name: self.name,
            description: self.description,
            phone_number: self.phone_number,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/shelter",
    responses(
        (status = 200, description = "All shelters", body = Envelope),
        (status = 401, description = "Not an admin", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "shelter"
)]
pub async fn list(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[])?;

    let shelters = auth.accounts().list_shelters().await?;
    Reply::ok("Shelters retrieved successfully!").with_data(&shelters)
}

#[utoipa::path(
    get,
    path = "/api/v1/shelter/{id}",
    params(("id" = String, Path, description = "Shelter id (UUID)")),
    responses(
        (status = 200, description = "The shelter", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 401, description = "Not an adopter or admin", body = Envelope),
        (status = 404, description = "No such shelter", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "shelter"
)]
pub async fn get(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Adopter])?;
    let id = parse_id(&id)?;

    let shelter = auth
        .accounts()
        .shelter(id)
        .await?
        .ok_or_else(|| Error::not_found(KIND, id))?;
    Reply::ok("Shelter retrieved successfully!").with_data(&shelter)
}

#[utoipa::path(
    post,
    path = "/api/v1/shelter",
    request_body = CreateShelterRequest,
    responses(
        (status = 201, description = "Created; `data` is the new id", body = Envelope),
        (status = 400, description = "Invalid fields", body = Envelope),
        (status = 409, description = "Email already registered", body = Envelope)
    ),
    tag = "shelter"
)]
#[instrument(skip_all)]
pub async fn create(
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<CreateShelterRequest>, JsonRejection>,
) -> Result<Reply> {
    let request = json_body(payload)?;
    request.validate()?;

    let new_shelter = NewShelter {
        email: normalize_email(&request.email),
        password_hash: hash_password_blocking(request.password).await?,
        name: request.name,
        description: request.description,
        phone_number: request.phone_number,
        address: request.address,
        latitude: request.latitude,
        longitude: request.longitude,
    };

    let shelter = match auth.accounts().create_shelter(new_shelter).await? {
        WriteOutcome::Written(shelter) => shelter,
        WriteOutcome::Conflict(taken) => {
            return Err(Error::Conflict(taken.message().to_string()));
        }
        WriteOutcome::NotFound => {
            return Err(anyhow!("shelter insert reported a missing row").into());
        }
    };

    let token = auth
        .tokens()
        .issue(&shelter.id.to_string(), Role::Shelter)
        .await?;

    info!(shelter_id = %shelter.id, "shelter created");

    Reply::created("Shelter created succesfully!")
        .with_token(token)
        .with_data(&shelter.id)
}

#[utoipa::path(
    put,
    path = "/api/v1/shelter/{id}",
    params(("id" = String, Path, description = "Shelter id (UUID)")),
    request_body = UpdateShelterRequest,
    responses(
        (status = 200, description = "Updated", body = Envelope),
        (status = 400, description = "Invalid fields or malformed id", body = Envelope),
        (status = 401, description = "Not this shelter or an admin", body = Envelope),
        (status = 404, description = "No such shelter", body = Envelope),
        (status = 409, description = "Email already registered", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "shelter"
)]
pub async fn update(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<UpdateShelterRequest>, JsonRejection>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Shelter])?;
    let id = parse_id(&id)?;
    require_self(&identity, id)?;

    let request = json_body(payload)?;
    request.validate()?;
    let changes = request.into_changes().await?;

    match auth.accounts().update_shelter(id, changes).await? {
        WriteOutcome::Written(shelter) => {
            Reply::ok("Shelter updated succesfully!").with_data(&shelter)
        }
        WriteOutcome::NotFound => Err(Error::not_found(KIND, id)),
        WriteOutcome::Conflict(taken) => Err(Error::Conflict(taken.message().to_string())),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/shelter/{id}",
    params(("id" = String, Path, description = "Shelter id (UUID)")),
    responses(
        (status = 200, description = "Deleted together with its user", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 401, description = "Not this shelter or an admin", body = Envelope),
        (status = 404, description = "No such shelter", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "shelter"
)]
pub async fn delete(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    require_role(&identity, &[Role::Shelter])?;
    let id = parse_id(&id)?;
    require_self(&identity, id)?;

    if !auth.accounts().delete_shelter(id).await? {
        return Err(Error::not_found(KIND, id));
    }

    info!(shelter_id = %id, "shelter deleted");

    Ok(Reply::ok("Shelter deleted succesfully!"))
}
