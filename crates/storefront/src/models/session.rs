//! Session-related types.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tower_sessions::Session;
use tower_sessions::session::Error;

use apoteka_core::Email;

/// Session-stored customer identity after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub email: Email,
    pub display_name: String,
    /// Bearer token issued by the commerce auth endpoint.
    pub token: String,
}

impl CurrentCustomer {
    /// Identifier used for reminder sync rows.
    #[must_use]
    pub fn sync_user_id(&self) -> &str {
        self.email.as_str()
    }
}

/// Session keys.
pub mod keys {
    /// Logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Cart lines.
    pub const CART: &str = "cart";

    /// Wishlisted product ids.
    pub const WISHLIST: &str = "wishlist";

    /// Medication reminders and intake logs.
    pub const REMINDERS: &str = "reminders";
}

/// Read a value from the session, falling back to its default.
///
/// A missing key and a value that no longer deserializes both yield the
/// default. Store failures are returned: defaulting there would let the
/// next `save` overwrite the stored value.
///
/// # Errors
///
/// Returns `Error::Store` if the session record cannot be loaded.
pub async fn load<T: DeserializeOwned + Default>(session: &Session, key: &str) -> Result<T, Error> {
    match session.get::<T>(key).await {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(Error::SerdeJson(e)) => {
            tracing::warn!(key = %key, error = %e, "Discarding unreadable session value");
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// Write a value to the session.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized or the session
/// store rejects it.
pub async fn save<T: Serialize>(
    session: &Session,
    key: &str,
    value: &T,
) -> Result<(), Error> {
    session.insert(key, value).await
}

/// Get the logged-in customer, if any.
pub async fn current_customer(session: &Session) -> Option<CurrentCustomer> {
    session
        .get::<CurrentCustomer>(keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
}
