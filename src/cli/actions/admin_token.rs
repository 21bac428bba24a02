use crate::auth::{Role, TokenConfig, TokenIssuer, ADMIN_SUBJECT};
use crate::storage::postgres::{self, PgStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub tokens: TokenConfig,
}

/// Mint an admin token, record it so it can be revoked, and print it.
/// # Errors
/// Returns an error if the database is unreachable or the token cannot be stored.
pub async fn execute(args: Args) -> Result<()> {
    let pool = postgres::connect(&args.dsn).await?;
    let issuer = TokenIssuer::new(args.tokens, Arc::new(PgStore::new(pool)));

    let token = issuer
        .issue(ADMIN_SUBJECT, Role::Admin)
        .await
        .context("Failed to issue admin token")?;

    info!("admin token issued");
    println!("{token}");

    Ok(())
}
