//! Router harness for handler tests: in-memory stores, a static Google
//! provider and `oneshot` requests.

use anyhow::{anyhow, bail, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    response::Response,
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::api;
use crate::auth::{
    identity::StaticIdentityProvider, password::hash_password, AuthService, ExternalIdentity,
    Role, TokenConfig, TokenIssuer, ADMIN_SUBJECT,
};
use crate::storage::{
    memory::MemoryStore, AccountStore, Adopter, NewAdopter, NewShelter, Shelter, WriteOutcome,
};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn adopter_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "first_name": "Ana",
        "last_name": "Lopez",
        "age": 34,
        "description": "Quiet flat, lots of walks",
        "house_type": "apartment",
        "has_pets": false,
        "has_children": true,
        "time_at_home": 6,
        "latitude": 40.4168,
        "longitude": -3.7038,
        "address": "Calle Mayor 1, Madrid"
    })
}

pub fn shelter_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "name": "Happy Tails",
        "description": "Dogs and cats looking for a home",
        "phone_number": "555-0100",
        "address": "1 Main St",
        "latitude": 40.0,
        "longitude": -3.0
    })
}

pub struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    auth: Arc<AuthService>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(StaticIdentityProvider::default())
    }

    pub fn with_google(provider_token: &str, identity: ExternalIdentity) -> Self {
        Self::with_provider(StaticIdentityProvider::default().with(provider_token, identity))
    }

    fn with_provider(provider: StaticIdentityProvider) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = TokenConfig::new(SecretString::from("handler-test-secret".to_string()));
        let tokens = TokenIssuer::new(config, store.clone());
        let auth = Arc::new(AuthService::new(store.clone(), tokens, Arc::new(provider)));
        Self {
            router: api::router(auth.clone()),
            store,
            auth,
        }
    }

    pub async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn json(response: Response) -> Result<(StatusCode, Value)> {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        Self::json(self.raw(method, uri, token, body).await?).await
    }

    /// Password login through the API; errors unless it answers 200.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        if status != StatusCode::OK {
            bail!("login failed with {status}: {body}");
        }
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without token"))
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.auth.tokens().issue(ADMIN_SUBJECT, Role::Admin).await
    }

    /// Adopter signup through the API; returns `(id, token)`.
    pub async fn signup_adopter(&self, email: &str) -> Result<(Uuid, String)> {
        let (status, body) = self
            .request(Method::POST, "/api/v1/adopter", None, Some(adopter_body(email)))
            .await?;
        if status != StatusCode::CREATED {
            bail!("signup failed with {status}: {body}");
        }
        let id = body["data"]
            .as_str()
            .ok_or_else(|| anyhow!("signup response without id"))?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| anyhow!("signup response without token"))?;
        Ok((Uuid::parse_str(id)?, token.to_string()))
    }

    pub async fn seed_shelter(&self, email: &str, password: &str) -> Result<Shelter> {
        let shelter = NewShelter {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            name: "Happy Tails".to_string(),
            description: "Dogs and cats".to_string(),
            phone_number: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            latitude: 40.0,
            longitude: -3.0,
        };
        match self.store.create_shelter(shelter).await? {
            WriteOutcome::Written(shelter) => Ok(shelter),
            other => bail!("unexpected outcome {other:?}"),
        }
    }

    pub async fn seed_google_adopter(&self, email: &str, google_id: &str) -> Result<Adopter> {
        let adopter = NewAdopter {
            email: email.to_string(),
            password_hash: None,
            google_id: Some(google_id.to_string()),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            age: 30,
            description: "Loves dogs".to_string(),
            house_type: "house".to_string(),
            has_pets: true,
            has_children: false,
            time_at_home: 4,
            latitude: 40.4,
            longitude: -3.7,
            address: "Calle Mayor 1".to_string(),
        };
        match self.store.create_adopter(adopter).await? {
            WriteOutcome::Written(adopter) => Ok(adopter),
            other => bail!("unexpected outcome {other:?}"),
        }
    }
}
