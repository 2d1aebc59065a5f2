//! Plain-HTTP portal session.
//!
//! Used when the deployment's portal exposes its internal day endpoint
//! to an authenticated cookie session. There is no UI to discover
//! resources from, so the resource table is fixed configuration; the
//! rest of the pipeline is identical to the browser backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::config::{Config, HttpConfig, HttpResource, PortalConfig};
use crate::error::{Result, SessionError};
use crate::extraction::table::parse_slot_table;
use crate::navigation::directory::{resolve_resources, RawListEntry};
use crate::records::{Credentials, Resource, SlotRecord};
use crate::session::{Portal, PortalSession};

/// Path of the portal's internal day endpoint, relative to `base_url`.
const DAY_ENDPOINT: &str = "/Reservas/DataDisponiveis";

/// HTTP-backed session factory.
pub struct HttpPortal {
    portal: PortalConfig,
    http: HttpConfig,
}

impl HttpPortal {
    pub fn new(config: &Config) -> Self {
        Self {
            portal: config.portal.clone(),
            http: config.http.clone(),
        }
    }
}

#[async_trait]
impl Portal for HttpPortal {
    fn id(&self) -> &str {
        "http"
    }

    async fn open_session(&self, credentials: &Credentials) -> Result<Box<dyn PortalSession>> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(self.http.request_timeout_secs))
            .build()
            .map_err(SessionError::Http)?;

        // Prime the login page so the site sets its first cookies.
        client
            .get(&self.portal.login_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(SessionError::Http)?;

        // Submit the login form.
        let login = client
            .post(&self.portal.login_url)
            .form(&[
                ("usuario", credentials.username.as_str()),
                ("senha", credentials.password.as_str()),
                ("termo", "on"),
            ])
            .send()
            .await
            .map_err(SessionError::Http)?;
        if !login.status().is_success() {
            return Err(SessionError::Authentication(format!(
                "login form rejected for '{}' ({})",
                credentials.username,
                login.status()
            ))
            .into());
        }

        // Visiting the application's entry page turns the site login
        // into a booking-application session. A rejected login bounces
        // here instead of establishing one.
        let entry = client
            .get(&self.http.session_entry_url)
            .send()
            .await
            .map_err(SessionError::Http)?;
        if !entry.status().is_success() {
            return Err(SessionError::Authentication(format!(
                "booking session was not established for '{}' ({})",
                credentials.username,
                entry.status()
            ))
            .into());
        }

        Ok(Box::new(HttpSession {
            client,
            base_url: self.http.base_url.trim_end_matches('/').to_string(),
            resource_phrase: self.portal.resource_phrase.clone(),
            table: self.http.resources.clone(),
        }))
    }
}

/// One authenticated cookie session.
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    resource_phrase: String,
    table: Vec<HttpResource>,
}

impl HttpSession {
    /// The portal's opaque identifier for a discovered resource.
    fn key_for(&self, resource: &Resource) -> Result<&str> {
        self.table
            .iter()
            .find(|entry| entry.label == resource.label)
            .map(|entry| entry.key.as_str())
            .ok_or_else(|| SessionError::UnknownResource(resource.label.clone()).into())
    }
}

#[async_trait]
impl PortalSession for HttpSession {
    async fn discover_resources(&mut self) -> Result<Vec<Resource>> {
        // Fixed per deployment - nothing renders asynchronously here,
        // so one pass is always complete. Run the table through the
        // same resolution as the browser list to get identical
        // filtering and ordering.
        let entries: Vec<RawListEntry> = self
            .table
            .iter()
            .enumerate()
            .map(|(position, entry)| RawListEntry {
                position,
                text: entry.label.clone(),
                action: None,
            })
            .collect();
        Ok(resolve_resources(&entries, &self.resource_phrase))
    }

    async fn select_resource(&mut self, resource: &Resource) -> Result<()> {
        // Stateless backend; just verify the resource is addressable.
        self.key_for(resource).map(|_| ())
    }

    async fn read_day(&mut self, resource: &Resource, date: NaiveDate) -> Result<Vec<SlotRecord>> {
        let key = self.key_for(resource)?.to_string();
        let day = date.format("%d-%m-%Y").to_string();
        let response = self
            .client
            .get(format!("{}{}", self.base_url, DAY_ENDPOINT))
            .query(&[
                ("data", day.as_str()),
                ("recurso", key.as_str()),
                ("unidade", ""),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(SessionError::Http)?;

        let body = response.text().await.map_err(SessionError::Http)?;
        let records = parse_slot_table(&body, date, resource.ordinal);
        debug!(resource = %resource.label, %date, records = records.len(), "day endpoint read");
        Ok(records)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        // Cookie sessions need no explicit teardown.
        Ok(())
    }
}
