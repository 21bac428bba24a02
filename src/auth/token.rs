//! Signed bearer tokens backed by a revocation table.
//!
//! A token is an HS256 JWT carrying `{sub, role}`. The signature and `exp`
//! make it self-describing; the `tokens` row makes it revocable. A token is
//! honored only while both hold.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, instrument};
use ulid::Ulid;
use uuid::Uuid;

use super::{Identity, Role};
use crate::error::Error;
use crate::storage::{TokenRecord, TokenStore};

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60 * 24 * 7;
pub const DEFAULT_TOKEN_ISSUER: &str = env!("CARGO_PKG_NAME");

#[derive(Clone, Debug)]
pub struct TokenConfig {
    secret: SecretString,
    ttl_seconds: i64,
    issuer: String,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
        }
    }

    #[must_use]
    pub const fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: TokenConfig, store: Arc<dyn TokenStore>) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            config,
            store,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign `{subject_id, role}` and persist the token so it can be revoked.
    ///
    /// # Errors
    /// Returns an error if signing or persisting fails.
    #[instrument(skip(self))]
    pub async fn issue(&self, subject_id: &str, role: Role) -> Result<String> {
        let now = now_unix_seconds();
        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.config.ttl_seconds),
            jti: Ulid::new().to_string(),
        };

        let content = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to sign token")?;

        self.store
            .insert(&TokenRecord {
                id: Uuid::new_v4(),
                content: content.clone(),
            })
            .await?;

        debug!(role = %role, "token issued");

        Ok(content)
    }

    /// Verify signature, issuer and expiry without consulting the store.
    ///
    /// # Errors
    /// Returns [`Error::Unauthenticated`] for any invalid token.
    pub fn decode(&self, content: &str) -> Result<Claims, Error> {
        decode::<Claims>(content, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("token rejected: {err}");
                Error::Unauthenticated
            })
    }

    /// Resolve a presented token to the identity it was issued for.
    ///
    /// # Errors
    /// Returns [`Error::Unauthenticated`] if the token is malformed, forged,
    /// expired, or revoked, and [`Error::Internal`] if the store fails.
    #[instrument(skip_all)]
    pub async fn resolve(&self, content: &str) -> Result<Identity, Error> {
        let claims = self.decode(content)?;

        if !self.store.contains(content).await? {
            debug!("token signature valid but revoked");
            return Err(Error::Unauthenticated);
        }

        Ok(Identity::new(claims.sub, claims.role))
    }

    /// Delete the stored token. Revoking an unknown token is not an error.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    #[instrument(skip_all)]
    pub async fn revoke(&self, content: &str) -> Result<()> {
        let deleted = self.store.delete(content).await?;
        debug!(deleted, "token revoked");
        Ok(())
    }
}
