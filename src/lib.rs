//! # pawhome
//!
//! HTTP API behind a pet-adoption site. Adopters and shelters sign up, log in
//! with a password or a Google ID token, and receive a signed bearer token.
//! Every issued token is also stored, so logging out revokes it immediately
//! instead of waiting for it to expire.
//!
//! ## Roles
//!
//! A user's role is never stored. It follows from which profile the user
//! owns (`adopter` or `shelter`). `admin` tokens are minted out of band by the
//! `admin-token` CLI action and pass every authorization gate.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_crate() {
        assert!(APP_USER_AGENT.starts_with("pawhome/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}
