use axum::{extract::Extension, http::HeaderMap};
use std::sync::Arc;

use super::principal::require_auth;
use crate::api::envelope::{Envelope, Reply};
use crate::auth::AuthService;
use crate::error::Result;

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "The caller's adopter or shelter record", body = Envelope),
        (status = 401, description = "Missing, invalid or revoked token", body = Envelope),
        (status = 404, description = "The profile behind the token no longer exists", body = Envelope),
        (status = 418, description = "Admins have no profile", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn profile(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    let identity = require_auth(&headers, &auth).await?;
    let profile = auth.profile_for(&identity).await?;
    Reply::ok("Profile retrieved successfully!").with_data(&profile)
}
