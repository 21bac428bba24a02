//! Response envelope shared by every endpoint: `{status, message, token?, data?}`.
//!
//! Handlers return [`Reply`] on success and [`Error`] on failure; both render
//! through [`Envelope`], and the HTTP status always equals `status`.

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::error::{Error, Result};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

/// Successful response builder.
#[derive(Debug)]
pub struct Reply {
    status: StatusCode,
    message: String,
    token: Option<String>,
    data: Option<Value>,
}

impl Reply {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            token: None,
            data: None,
        }
    }

    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, message)
    }

    #[must_use]
    pub fn created(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, message)
    }

    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// # Errors
    /// Returns [`Error::Internal`] if `data` cannot be serialized.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Result<Self> {
        let value = serde_json::to_value(data).context("failed to serialize response data")?;
        self.data = Some(value);
        Ok(self)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            status: self.status.as_u16(),
            message: self.message,
            token: self.token,
            data: self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

impl Error {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidExternalToken | Self::Unauthenticated | Self::Forbidden(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AdminProfileRejected => StatusCode::IM_A_TEAPOT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        Reply::new(status, message).into_response()
    }
}
