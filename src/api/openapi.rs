use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::envelope::Envelope;
use super::handlers::{
    adopters::{self, CreateAdopterRequest, UpdateAdopterRequest},
    auth::{
        login, profile, session,
        types::{GoogleLoginRequest, LoginRequest},
    },
    health::{self, Health},
    shelters::{self, CreateShelterRequest, UpdateShelterRequest},
};
use crate::auth::{ExternalIdentity, Profile, Role};
use crate::storage::{Adopter, Shelter};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::login,
        login::google,
        profile::profile,
        session::logout,
        session::verify,
        session::verify_fields,
        adopters::list,
        adopters::get,
        adopters::create,
        adopters::update,
        adopters::delete,
        shelters::list,
        shelters::get,
        shelters::create,
        shelters::update,
        shelters::delete,
    ),
    components(schemas(
        Envelope,
        Health,
        LoginRequest,
        GoogleLoginRequest,
        CreateAdopterRequest,
        UpdateAdopterRequest,
        CreateShelterRequest,
        UpdateShelterRequest,
        Adopter,
        Shelter,
        Profile,
        ExternalIdentity,
        Role,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, Google login, profile and logout"),
        (name = "adopter", description = "Adopter accounts"),
        (name = "shelter", description = "Shelter accounts"),
        (name = "health", description = "Service and database health")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
