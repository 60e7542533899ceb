//! Session store migration.
//!
//! # Usage
//!
//! ```bash
//! apoteka-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use apoteka_storefront::config::{ConfigError, database_url_from_env};
use apoteka_storefront::db;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create the `tower_sessions` schema and table if missing.
///
/// # Errors
///
/// Returns an error if the URL is missing or the database rejects the DDL.
pub async fn session_store() -> Result<(), MigrationError> {
    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to session database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating session store schema...");
    db::migrate_session_store(&pool).await?;

    tracing::info!("Session store ready");
    Ok(())
}
