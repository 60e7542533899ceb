//! Database access for the storefront.
//!
//! `PostgreSQL` only backs the session store. Catalog, orders and content
//! live upstream; carts, wishlists and reminder books live in the session.
//!
//! # Schema
//!
//! The `tower_sessions.session` table is owned by
//! `tower-sessions-sqlx-store` and created by [`migrate_session_store`]:
//! ```bash
//! cargo run -p apoteka-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions_sqlx_store::PostgresStore;

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Session store over `pool`.
#[must_use]
pub fn session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the session schema and table if missing.
///
/// # Errors
///
/// Returns `sqlx::Error` if the DDL fails.
pub async fn migrate_session_store(pool: &PgPool) -> Result<(), sqlx::Error> {
    session_store(pool).migrate().await
}

/// Round-trip a trivial query. Used by the readiness check.
///
/// # Errors
///
/// Returns `sqlx::Error` if the database is unreachable.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
