//! Bearer token endpoints: logout and field verification.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use std::sync::Arc;

use super::types::LoginRequest;
use crate::api::{
    envelope::{Envelope, Reply},
    handlers::{check_email, check_not_empty, json_body},
};
use crate::auth::AuthService;
use crate::error::{Error, Result};

const VERIFIED_MESSAGE: &str = "The fields provided are correct";

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Token revoked (also when it was already gone)", body = Envelope),
        (status = 401, description = "No bearer token", body = Envelope)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Reply> {
    // Not resolved first, so logging out twice is still a success.
    let token = extract_bearer_token(&headers).ok_or(Error::Unauthenticated)?;
    auth.logout(&token).await?;
    Ok(Reply::ok("User logged out successfully!"))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    responses((status = 200, description = "Liveness of the auth routes", body = Envelope)),
    tag = "auth"
)]
pub async fn verify() -> Reply {
    Reply::ok(VERIFIED_MESSAGE)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login fields are well formed", body = Envelope),
        (status = 400, description = "Malformed email or empty password", body = Envelope)
    ),
    tag = "auth"
)]
pub async fn verify_fields(
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Reply> {
    let request = json_body(payload)?;
    check_email(&request.email)?;
    check_not_empty("password", &request.password)?;
    Ok(Reply::ok(VERIFIED_MESSAGE))
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
