//! Login orchestration: who is asking, which profile they own, and which
//! token they get back.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    normalize_email, password::verify_password_blocking, ExternalIdentity, Identity,
    IdentityProvider, Role, TokenIssuer,
};
use crate::error::{Error, Result};
use crate::storage::{AccountStore, Adopter, ProfileKind, Shelter};

/// Successful password login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub profile_id: Uuid,
    pub role: Role,
}

impl LoginOutcome {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self.role {
            Role::Shelter => "Shelter logged in successfully!",
            Role::Adopter | Role::Admin => "Adopter logged in successfully!",
        }
    }
}

/// Result of exchanging a Google ID token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalLogin {
    /// A matching adopter exists and was issued a token.
    LoggedIn { token: String },
    /// No adopter carries this Google id yet; the client finishes signup
    /// by posting the same Google token with the adopter fields.
    Unregistered(ExternalIdentity),
}

/// The caller's own profile record.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Profile {
    Adopter(Adopter),
    Shelter(Shelter),
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    tokens: TokenIssuer,
    identity: Arc<dyn IdentityProvider>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: TokenIssuer,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            accounts,
            tokens,
            identity,
        }
    }

    #[must_use]
    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Email + password login.
    ///
    /// # Errors
    /// [`Error::InvalidCredentials`] when the email is unknown, the password
    /// does not match, or the user owns no profile.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        let user = self.accounts.find_user_by_email(&email).await?;

        // Verify even for unknown users so both failures cost the same.
        let stored_hash = user.as_ref().and_then(|user| user.password_hash.clone());
        let matches = verify_password_blocking(password.to_string(), stored_hash).await?;

        let Some(account) = user.filter(|_| matches).and_then(|user| user.account) else {
            debug!("password login rejected");
            return Err(Error::InvalidCredentials);
        };

        let identity = Identity::for_account(account);
        let token = self
            .tokens
            .issue(&identity.subject_id, identity.role)
            .await?;

        info!(role = %identity.role, "user logged in");

        Ok(LoginOutcome {
            token,
            profile_id: account.id(),
            role: identity.role,
        })
    }

    /// Exchange a Google ID token for one of ours.
    ///
    /// # Errors
    /// [`Error::InvalidExternalToken`] when Google does not vouch for it.
    #[instrument(skip_all)]
    pub async fn login_with_external_identity(&self, provider_token: &str) -> Result<ExternalLogin> {
        let Some(external) = self.identity.resolve(provider_token).await else {
            return Err(Error::InvalidExternalToken);
        };

        let user = self
            .accounts
            .find_user_by_google_id(&external.google_id)
            .await?;

        match user.and_then(|user| user.account) {
            Some(account) => {
                // Google ids only ever live on adopter rows.
                let token = self
                    .tokens
                    .issue(&account.id().to_string(), Role::Adopter)
                    .await?;
                info!("user logged in with google");
                Ok(ExternalLogin::LoggedIn { token })
            }
            None => {
                debug!("google identity not registered yet");
                Ok(ExternalLogin::Unregistered(external))
            }
        }
    }

    /// Identity Google vouches for, used to attach a Google account at signup.
    ///
    /// # Errors
    /// [`Error::InvalidExternalToken`] when the token does not resolve.
    pub async fn resolve_external(&self, provider_token: &str) -> Result<ExternalIdentity> {
        self.identity
            .resolve(provider_token)
            .await
            .ok_or(Error::InvalidExternalToken)
    }

    /// Resolve a bearer token.
    ///
    /// # Errors
    /// [`Error::Unauthenticated`] for invalid or revoked tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        self.tokens.resolve(token).await
    }

    /// Profile of whoever holds `token`.
    ///
    /// # Errors
    /// See [`Self::authenticate`] and [`Self::profile_for`].
    #[instrument(skip_all)]
    pub async fn profile(&self, token: &str) -> Result<Profile> {
        let identity = self.authenticate(token).await?;
        self.profile_for(&identity).await
    }

    /// # Errors
    /// [`Error::AdminProfileRejected`] for admins and [`Error::NotFound`]
    /// when the profile no longer exists.
    pub async fn profile_for(&self, identity: &Identity) -> Result<Profile> {
        let Some(kind) = identity.role.profile_kind() else {
            return Err(Error::AdminProfileRejected);
        };

        let not_found = || Error::not_found(kind, &identity.subject_id);
        let id = Uuid::parse_str(&identity.subject_id).map_err(|_| not_found())?;

        match kind {
            ProfileKind::Adopter => self
                .accounts
                .adopter(id)
                .await?
                .map(Profile::Adopter)
                .ok_or_else(not_found),
            ProfileKind::Shelter => self
                .accounts
                .shelter(id)
                .await?
                .map(Profile::Shelter)
                .ok_or_else(not_found),
        }
    }

    /// Revoke `token`. Unknown or already revoked tokens are fine.
    ///
    /// # Errors
    /// Only when the token store fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.tokens.revoke(token).await?;
        Ok(())
    }
}
