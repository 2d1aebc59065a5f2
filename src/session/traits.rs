//! Session trait definitions.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::records::{Credentials, Resource, SlotRecord};

/// Factory for authenticated portal sessions.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Short backend identifier for logs.
    fn id(&self) -> &str;

    /// Open a fresh authenticated session. Fails with
    /// `SessionError::Authentication` when the portal rejects the
    /// credentials - the one error that aborts a whole run.
    async fn open_session(&self, credentials: &Credentials) -> Result<Box<dyn PortalSession>>;
}

/// One authenticated session against the portal.
///
/// A session owns its navigation state exclusively and is never shared
/// across workers; every concurrent resource gets its own.
#[async_trait]
pub trait PortalSession: Send {
    /// One discovery pass over the resource list view. May legitimately
    /// return an empty list while the portal is still rendering it; the
    /// caller retries with backoff before giving up.
    async fn discover_resources(&mut self) -> Result<Vec<Resource>>;

    /// Focus the session on one resource's booking view.
    async fn select_resource(&mut self, resource: &Resource) -> Result<()>;

    /// Read all slots for one date. An empty vec means "no data for
    /// that date" and is not an error.
    async fn read_day(&mut self, resource: &Resource, date: NaiveDate) -> Result<Vec<SlotRecord>>;

    /// Release the session's underlying resources. Called on every
    /// exit path, success or failure.
    async fn close(self: Box<Self>) -> Result<()>;
}
