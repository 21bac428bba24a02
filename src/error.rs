//! Typed failures returned up the call chain.
//!
//! Every variant maps to exactly one status and client message; the
//! conversion lives in `api::envelope` so there is a single place where
//! errors become responses.

use thiserror::Error;

use crate::storage::ProfileKind;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("Email or password not correct")]
    InvalidCredentials,

    #[error("Google token not valid or not provided")]
    InvalidExternalToken,

    #[error("Unauthorized")]
    Unauthenticated,

    /// Authenticated but not allowed: wrong role or someone else's record.
    #[error("{0}")]
    Forbidden(String),

    #[error("{kind} with id {id} not found.")]
    NotFound { kind: ProfileKind, id: String },

    #[error("Why are you trying to retrieve your profile admin? lol 🤓")]
    AdminProfileRejected,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(kind: ProfileKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
