//! Authorization guard.
//!
//! Flow Overview: read the bearer token, resolve it through the token store,
//! then gate by role and, for writes, by "acting on your own record". Admins
//! pass every gate.

use axum::http::HeaderMap;
use uuid::Uuid;

use super::session::extract_bearer_token;
use crate::auth::{AuthService, Identity, Role};
use crate::error::{Error, Result};

/// Resolve the bearer token into an identity, or 401.
///
/// # Errors
/// [`Error::Unauthenticated`] for a missing, invalid or revoked token.
pub async fn require_auth(headers: &HeaderMap, auth: &AuthService) -> Result<Identity> {
    let token = extract_bearer_token(headers).ok_or(Error::Unauthenticated)?;
    auth.authenticate(&token).await
}

/// # Errors
/// [`Error::Forbidden`] naming the first allowed role.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<()> {
    if identity.is_admin() || allowed.contains(&identity.role) {
        return Ok(());
    }
    let expected = allowed.first().copied().unwrap_or(Role::Admin);
    Err(Error::Forbidden(format!(
        "You have to be a {expected} to perform this operation"
    )))
}

/// # Errors
/// [`Error::Forbidden`] when a non-admin targets someone else's record.
pub fn require_self(identity: &Identity, id: Uuid) -> Result<()> {
    if identity.is_admin() || identity.subject_id == id.to_string() {
        Ok(())
    } else {
        Err(Error::Forbidden(
            "You can only perform this operation for yourself".to_string(),
        ))
    }
}
