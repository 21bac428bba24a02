//! Authentication endpoints under `/api/v1/auth`.
//!
//! - `login`: password login and Google ID token exchange.
//! - `profile`: the caller's own adopter or shelter record.
//! - `session`: logout, verify, and bearer extraction.
//! - `principal`: the guard every protected handler runs first.

pub mod login;
pub mod principal;
pub mod profile;
pub mod session;
pub mod types;

pub use principal::{require_auth, require_role, require_self};
