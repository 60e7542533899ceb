//! Application state shared across handlers.

use std::sync::Arc;

use apoteka_core::CurrencyCode;
use sqlx::PgPool;

use crate::commerce::CommerceClient;
use crate::config::StorefrontConfig;
use crate::content::ContentClient;
use crate::reminders::sync::{ReminderSyncClient, SyncError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool and upstream API clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    commerce: CommerceClient,
    content: Option<ContentClient>,
    sync: Option<ReminderSyncClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Content and sync clients are only built when configured.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let commerce = CommerceClient::new(&config.commerce);
        let content = config.content.as_ref().map(ContentClient::new);
        let sync = config.sync.as_ref().map(ReminderSyncClient::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                commerce,
                content,
                sync,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Get the content API client, if configured.
    #[must_use]
    pub fn content(&self) -> Option<&ContentClient> {
        self.inner.content.as_ref()
    }

    /// Get the reminder sync client.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotConfigured` when no sync service is set up.
    pub fn sync(&self) -> Result<&ReminderSyncClient, SyncError> {
        self.inner.sync.as_ref().ok_or(SyncError::NotConfigured)
    }

    /// Store currency used to interpret commerce prices.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.config.commerce.currency
    }
}
