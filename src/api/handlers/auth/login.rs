use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use std::sync::Arc;

use super::types::{GoogleLoginRequest, LoginRequest};
use crate::api::{
    envelope::{Envelope, Reply},
    handlers::json_body,
};
use crate::auth::{AuthService, ExternalLogin};
use crate::error::Result;

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; `data` is the profile id", body = Envelope),
        (status = 400, description = "Email or password not correct", body = Envelope)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Reply> {
    let request = json_body(payload)?;
    let outcome = auth.login(&request.email, &request.password).await?;

    Reply::ok(outcome.message())
        .with_token(outcome.token.clone())
        .with_data(&outcome.profile_id)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/google",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Logged in, or the resolved identity when not registered yet", body = Envelope),
        (status = 401, description = "Google token not valid or not provided", body = Envelope)
    ),
    tag = "auth"
)]
pub async fn google(
    Extension(auth): Extension<Arc<AuthService>>,
    payload: std::result::Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<Reply> {
    // An unreadable body is the same as no token at all.
    let provider_token = payload.map(|Json(body)| body.token).unwrap_or_default();

    match auth.login_with_external_identity(&provider_token).await? {
        ExternalLogin::LoggedIn { token } => {
            Ok(Reply::ok("User logged in successfully with google").with_token(token))
        }
        ExternalLogin::Unregistered(identity) => {
            Reply::ok("User registered with google").with_data(&identity)
        }
    }
}
