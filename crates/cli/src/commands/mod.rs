//! Subcommand implementations.

pub mod customers;
pub mod migrate;
pub mod orders;

use marketplace_storefront::db::{self, PgRepository};
use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by commands that talk to the marketplace database.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Neither `MARKETPLACE_DATABASE_URL` nor `DATABASE_URL` is set.
    #[error("Missing environment variable: MARKETPLACE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read the database URL the same way the storefront does.
pub fn database_url() -> Result<SecretString, ConnectError> {
    dotenvy::dotenv().ok();

    std::env::var("MARKETPLACE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingDatabaseUrl)
}

/// Connect and wrap the pool in the storefront repository.
pub async fn repository() -> Result<PgRepository, ConnectError> {
    let url = database_url()?;
    tracing::info!("Connecting to marketplace database...");
    let pool = db::create_pool(&url).await?;
    Ok(PgRepository::new(pool))
}
