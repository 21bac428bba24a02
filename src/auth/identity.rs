//! External identity exchange (Google Sign-In).
//!
//! The provider's own infrastructure vouches for the token; nothing here
//! verifies signatures locally. Any failure collapses to `None`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;
use utoipa::ToSchema;

use crate::APP_USER_AGENT;

pub const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_GOOGLE_TIMEOUT_SECONDS: u64 = 10;

/// Profile fields resolved from a provider token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExternalIdentity {
    pub google_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a provider token, or `None` if it cannot be trusted.
    async fn resolve(&self, provider_token: &str) -> Option<ExternalIdentity>;
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    tokeninfo_url: Url,
    client_id: Option<String>,
    timeout: Duration,
}

impl GoogleConfig {
    #[must_use]
    pub fn new(tokeninfo_url: Url) -> Self {
        Self {
            tokeninfo_url,
            client_id: None,
            timeout: Duration::from_secs(DEFAULT_GOOGLE_TIMEOUT_SECONDS),
        }
    }

    /// Only accept tokens minted for this OAuth client.
    #[must_use]
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id.filter(|id| !id.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn tokeninfo_url(&self) -> &Url {
        &self.tokeninfo_url
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    aud: Option<String>,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl TokenInfo {
    fn into_identity(self) -> ExternalIdentity {
        ExternalIdentity {
            google_id: self.sub,
            email: self.email.unwrap_or_default().trim().to_lowercase(),
            first_name: self.given_name.unwrap_or_default(),
            last_name: self.family_name.unwrap_or_default(),
            image: self.picture,
        }
    }
}

#[derive(Debug)]
pub struct GoogleIdentityProvider {
    client: Client,
    config: GoogleConfig,
}

impl GoogleIdentityProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    #[instrument(skip_all)]
    async fn resolve(&self, provider_token: &str) -> Option<ExternalIdentity> {
        let provider_token = provider_token.trim();
        if provider_token.is_empty() {
            return None;
        }

        let response = match self
            .client
            .get(self.config.tokeninfo_url.clone())
            .query(&[("id_token", provider_token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Error calling Google tokeninfo: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Google rejected token: {}", response.status());
            return None;
        }

        let info = match response.json::<TokenInfo>().await {
            Ok(info) => info,
            Err(e) => {
                error!("Malformed Google tokeninfo response: {e}");
                return None;
            }
        };

        if let Some(expected) = self.config.client_id() {
            if info.aud.as_deref() != Some(expected) {
                warn!("Google token issued for another client");
                return None;
            }
        }

        if info.sub.trim().is_empty() {
            return None;
        }

        Some(info.into_identity())
    }
}

/// Provider that knows a fixed set of tokens.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct StaticIdentityProvider {
    identities: std::collections::HashMap<String, ExternalIdentity>,
}

#[cfg(test)]
impl StaticIdentityProvider {
    pub(crate) fn with(mut self, token: &str, identity: ExternalIdentity) -> Self {
        self.identities.insert(token.to_string(), identity);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, provider_token: &str) -> Option<ExternalIdentity> {
        self.identities.get(provider_token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn tokeninfo(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        match params.get("id_token").map(String::as_str) {
            Some("good") => (
                StatusCode::OK,
                Json(json!({
                    "sub": "1234567890",
                    "aud": "client-123",
                    "email": "Ana@Example.com",
                    "given_name": "Ana",
                    "family_name": "Lopez",
                    "picture": "https://example.com/ana.png"
                })),
            )
                .into_response(),
            Some("garbled") => (StatusCode::OK, "not json").into_response(),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_token" })),
            )
                .into_response(),
        }
    }

    async fn fake_google() -> anyhow::Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().route("/tokeninfo", get(tokeninfo));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Url::parse(&format!("http://{addr}/tokeninfo"))?)
    }

    #[tokio::test]
    async fn resolves_valid_token() -> anyhow::Result<()> {
        let url = fake_google().await?;
        let provider = GoogleIdentityProvider::new(
            GoogleConfig::new(url).with_client_id(Some("client-123".to_string())),
        )?;

        let identity = provider.resolve("good").await;
        assert_eq!(
            identity,
            Some(ExternalIdentity {
                google_id: "1234567890".to_string(),
                email: "ana@example.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Lopez".to_string(),
                image: Some("https://example.com/ana.png".to_string()),
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn audience_mismatch_is_invalid() -> anyhow::Result<()> {
        let url = fake_google().await?;
        let provider = GoogleIdentityProvider::new(
            GoogleConfig::new(url).with_client_id(Some("someone-else".to_string())),
        )?;
        assert_eq!(provider.resolve("good").await, None);
        Ok(())
    }

    #[tokio::test]
    async fn provider_rejection_and_garbage_are_invalid() -> anyhow::Result<()> {
        let url = fake_google().await?;
        let provider = GoogleIdentityProvider::new(GoogleConfig::new(url))?;
        assert_eq!(provider.resolve("expired").await, None);
        assert_eq!(provider.resolve("garbled").await, None);
        assert_eq!(provider.resolve("  ").await, None);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_provider_is_invalid() -> anyhow::Result<()> {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/tokeninfo"))?;
        let provider = GoogleIdentityProvider::new(
            GoogleConfig::new(url).with_timeout(Duration::from_secs(2)),
        )?;
        assert_eq!(provider.resolve("good").await, None);
        Ok(())
    }

    #[test]
    fn blank_client_id_is_ignored() -> anyhow::Result<()> {
        let config = GoogleConfig::new(Url::parse(DEFAULT_GOOGLE_TOKENINFO_URL)?)
            .with_client_id(Some("  ".to_string()));
        assert_eq!(config.client_id(), None);
        Ok(())
    }
}
