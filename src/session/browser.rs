//! WebDriver-driven portal session (headless Chrome).
//!
//! The portal nests its booking UI in iframes, opens popup windows on
//! navigation and renders lists asynchronously, so every step here
//! re-establishes where it is (window, frame) before acting. Clicks go
//! through JavaScript: several of the portal's controls sit under
//! overlays that defeat native clicks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use thirtyfour::prelude::*;
use thirtyfour::WindowHandle;
use tracing::{debug, warn};

use crate::config::{BrowserConfig, Config, ExtractionConfig, PortalConfig};
use crate::error::{QuadraError, Result, SessionError};
use crate::extraction::table::parse_slot_table;
use crate::navigation::calendar::{self, CalendarSurface};
use crate::navigation::directory::{resolve_resources, RawListEntry};
use crate::records::{Credentials, Resource, SlotRecord};
use crate::session::{Portal, PortalSession};

// Portal-specific markup. The navigation sequence is tied to this
// portal; only its endpoints are configuration.
const SEL_USER_FIELD: &str = "mem";
const SEL_PASS_FIELD: &str = "pass";
const SEL_TERMS_CHECKBOX: &str = "termo";
const SEL_TABLE_BODY: &str = "#tabelaDePeriodos tbody";
const SEL_CAL_HEADER: &str = ".datepicker-days th.datepicker-switch";
const SEL_CAL_NEXT: &str = ".datepicker-days th.next";
const SEL_CAL_DAYS: &str =
    ".datepicker-days td.day:not(.old):not(.new):not(.disabled):not(.foraPeriodo)";
const XP_RESERVA_LINKS: &str = "//a[contains(@onclick,'SelectReserva')]";
const XP_FRAME_MARKER: &str = "//*[contains(translate(.,'RESERVA','reserva'),'reserva')]";
const XP_NEW_RESERVATION: &str = "//*[self::a or self::button][contains(.,'Nova Reserva')]";
const XP_LOGIN_BUTTON: &str = "//button[contains(.,'ENTRAR')]";
const XP_LOGIN_SUBMIT: &str = "//input[@type='submit' or @value='ENTRAR']";

fn wderr(e: thirtyfour::error::WebDriverError) -> QuadraError {
    SessionError::WebDriver(e).into()
}

/// Browser-backed session factory.
pub struct BrowserPortal {
    portal: PortalConfig,
    browser: BrowserConfig,
    extraction: ExtractionConfig,
}

impl BrowserPortal {
    pub fn new(config: &Config) -> Self {
        Self {
            portal: config.portal.clone(),
            browser: config.browser.clone(),
            extraction: config.extraction.clone(),
        }
    }

    async fn build_driver(&self) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        if self.browser.headless {
            caps.add_arg("--headless=new").map_err(wderr)?;
        }
        for arg in [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--window-size=1366,900",
            "--blink-settings=imagesEnabled=false",
        ] {
            caps.add_arg(arg).map_err(wderr)?;
        }
        if let Some(binary) = &self.browser.chrome_binary {
            caps.set_binary(binary).map_err(wderr)?;
        }

        let driver = WebDriver::new(&self.browser.webdriver_url, caps)
            .await
            .map_err(wderr)?;
        driver
            .set_page_load_timeout(Duration::from_secs(self.browser.page_load_timeout_secs))
            .await
            .map_err(wderr)?;
        Ok(driver)
    }
}

#[async_trait]
impl Portal for BrowserPortal {
    fn id(&self) -> &str {
        "browser"
    }

    async fn open_session(&self, credentials: &Credentials) -> Result<Box<dyn PortalSession>> {
        let driver = self.build_driver().await?;
        let mut session = BrowserSession {
            driver,
            portal: self.portal.clone(),
            browser: self.browser.clone(),
            extraction: self.extraction.clone(),
            cursor: NavigationCursor::default(),
        };
        match session.bootstrap(credentials).await {
            Ok(()) => Ok(Box::new(session)),
            Err(e) => {
                if let Err(quit_err) = session.driver.clone().quit().await {
                    debug!(error = %quit_err, "failed to quit browser after bootstrap error");
                }
                Err(e)
            }
        }
    }
}

/// Per-session pointer into the portal's frame/window/calendar context.
/// Owned exclusively by its session.
#[derive(Debug, Default)]
struct NavigationCursor {
    /// Window handle currently driven.
    window: Option<WindowHandle>,
    /// Whether the session is inside the reservation iframe.
    in_frame: bool,
    /// First day of the month the calendar currently displays, once
    /// known.
    month: Option<NaiveDate>,
}

/// One live browser session, logged in and parked on the reservation UI.
pub struct BrowserSession {
    driver: WebDriver,
    portal: PortalConfig,
    browser: BrowserConfig,
    extraction: ExtractionConfig,
    cursor: NavigationCursor,
}

impl BrowserSession {
    fn element_wait(&self) -> Duration {
        Duration::from_secs(self.browser.element_wait_secs)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.extraction.poll_interval_ms)
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.extraction.settle_ms)
    }

    /// Poll for an element until it renders or the element wait runs out.
    async fn find_present(&self, by: By) -> Result<WebElement> {
        let deadline = tokio::time::Instant::now() + self.element_wait();
        loop {
            match self.driver.find(by.clone()).await {
                Ok(element) => return Ok(element),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(self.poll_interval()).await;
                }
                Err(_) => {
                    return Err(SessionError::ElementMissing(format!("{by:?}")).into());
                }
            }
        }
    }

    /// First clickable element matching any of the selectors, trying
    /// them in order until one renders or the wait runs out.
    async fn find_clickable_any(&self, selectors: &[By]) -> Result<WebElement> {
        let deadline = tokio::time::Instant::now() + self.element_wait();
        loop {
            for by in selectors {
                if let Ok(element) = self.driver.find(by.clone()).await {
                    if element.is_clickable().await.unwrap_or(false) {
                        return Ok(element);
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(
                    SessionError::ElementMissing(format!("none of {selectors:?}")).into(),
                );
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    async fn js_click(&self, element: &WebElement) -> Result<()> {
        self.driver
            .execute(
                "arguments[0].scrollIntoView({block:'center'}); arguments[0].click();",
                vec![element.to_json().map_err(wderr)?],
            )
            .await
            .map_err(wderr)?;
        Ok(())
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.driver
            .goto(&self.portal.login_url)
            .await
            .map_err(wderr)?;

        let user_field = self.find_present(By::Id(SEL_USER_FIELD)).await?;
        let pass_field = self.find_present(By::Id(SEL_PASS_FIELD)).await?;
        user_field.clear().await.map_err(wderr)?;
        user_field
            .send_keys(credentials.username.as_str())
            .await
            .map_err(wderr)?;
        pass_field.clear().await.map_err(wderr)?;
        pass_field
            .send_keys(credentials.password.as_str())
            .await
            .map_err(wderr)?;

        // Terms checkbox, when the portal shows one.
        if let Ok(checkbox) = self.driver.find(By::Id(SEL_TERMS_CHECKBOX)).await {
            if let Ok(json) = checkbox.to_json() {
                let _ = self
                    .driver
                    .execute(
                        "if(!arguments[0].checked){arguments[0].click();}",
                        vec![json],
                    )
                    .await;
            }
        }

        let button = self
            .find_clickable_any(&[
                By::XPath(XP_LOGIN_BUTTON),
                By::Css("button[type='submit']"),
                By::XPath(XP_LOGIN_SUBMIT),
            ])
            .await?;
        self.js_click(&button).await?;

        // The portal redirects into the booking domain on success.
        if !self
            .wait_for_url(|url| url.contains("webware") || url.contains("servc"))
            .await
        {
            return Err(SessionError::Authentication(format!(
                "portal did not accept credentials for '{}'",
                credentials.username
            ))
            .into());
        }
        Ok(())
    }

    async fn wait_for_url<F: Fn(&str) -> bool>(&self, predicate: F) -> bool {
        let deadline = tokio::time::Instant::now() + self.element_wait();
        loop {
            if let Ok(url) = self.driver.current_url().await {
                if predicate(url.as_str()) {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Login plus navigation to the reservation list view.
    async fn bootstrap(&mut self, credentials: &Credentials) -> Result<()> {
        self.login(credentials).await?;
        self.open_reservation_list().await
    }

    async fn open_reservation_list(&mut self) -> Result<()> {
        self.driver
            .goto(&self.portal.entry_url)
            .await
            .map_err(wderr)?;
        tokio::time::sleep(self.settle()).await;
        self.driver
            .goto(&self.portal.reservations_url)
            .await
            .map_err(wderr)?;
        tokio::time::sleep(self.settle()).await;

        self.adopt_new_window().await?;
        self.enter_reservation_frame().await?;

        // Some accounts land on an intermediate view with a "Nova
        // Reserva" entry point; follow it when present.
        if let Ok(link) = self.driver.find(By::XPath(XP_NEW_RESERVATION)).await {
            self.js_click(&link).await?;
            tokio::time::sleep(self.settle()).await;
            self.adopt_new_window().await?;
            self.enter_reservation_frame().await?;
        }
        Ok(())
    }

    /// Switch to a popup window when the portal spawned one.
    async fn adopt_new_window(&mut self) -> Result<bool> {
        let base = self.driver.window().await.map_err(wderr)?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        for handle in self.driver.windows().await.map_err(wderr)? {
            if handle != base {
                self.driver
                    .switch_to_window(handle.clone())
                    .await
                    .map_err(wderr)?;
                self.cursor.window = Some(handle);
                return Ok(true);
            }
        }
        self.cursor.window = Some(base);
        Ok(false)
    }

    /// Find and enter the iframe that hosts the reservation content,
    /// identified by its text mentioning reservations.
    async fn enter_reservation_frame(&mut self) -> Result<bool> {
        self.driver.enter_default_frame().await.map_err(wderr)?;
        self.cursor.in_frame = false;

        let frames = self
            .driver
            .find_all(By::Tag("iframe"))
            .await
            .map_err(wderr)?;
        for frame in frames {
            if frame.clone().enter_frame().await.is_err() {
                continue;
            }
            match self.driver.find_all(By::XPath(XP_FRAME_MARKER)).await {
                Ok(markers) if !markers.is_empty() => {
                    self.cursor.in_frame = true;
                    return Ok(true);
                }
                _ => {
                    self.driver.enter_default_frame().await.map_err(wderr)?;
                }
            }
        }
        Ok(false)
    }

    /// Scrape the raw reservation-list anchors as they currently render.
    async fn list_entries(&self) -> Result<Vec<RawListEntry>> {
        debug!(in_frame = self.cursor.in_frame, "scanning reservation list");
        let anchors = self
            .driver
            .find_all(By::XPath(XP_RESERVA_LINKS))
            .await
            .map_err(wderr)?;
        let mut entries = Vec::with_capacity(anchors.len());
        for (position, anchor) in anchors.iter().enumerate() {
            let text = anchor.text().await.unwrap_or_default();
            let action = anchor.attr("onclick").await.ok().flatten();
            entries.push(RawListEntry {
                position,
                text,
                action,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl PortalSession for BrowserSession {
    async fn discover_resources(&mut self) -> Result<Vec<Resource>> {
        // The list renders asynchronously after frame/window
        // transitions; re-enter the frame on every pass.
        self.enter_reservation_frame().await?;
        let entries = self.list_entries().await?;
        Ok(resolve_resources(&entries, &self.portal.resource_phrase))
    }

    async fn select_resource(&mut self, resource: &Resource) -> Result<()> {
        self.enter_reservation_frame().await?;
        let entries = self.list_entries().await?;
        let current = resolve_resources(&entries, &self.portal.resource_phrase);

        // Re-locate by stable key first; labels shuffle between renders,
        // court numbers do not. Ordinal is the fallback.
        let target = current
            .iter()
            .find(|r| resource.stable_key.is_some() && r.stable_key == resource.stable_key)
            .or_else(|| current.get(resource.ordinal))
            .ok_or_else(|| SessionError::UnknownResource(resource.label.clone()))?;

        let anchors = self
            .driver
            .find_all(By::XPath(XP_RESERVA_LINKS))
            .await
            .map_err(wderr)?;
        let anchor = anchors
            .get(target.position)
            .ok_or_else(|| SessionError::UnknownResource(resource.label.clone()))?;
        self.js_click(anchor).await?;
        tokio::time::sleep(self.settle()).await;

        self.adopt_new_window().await?;
        self.enter_reservation_frame().await?;
        Ok(())
    }

    async fn read_day(&mut self, resource: &Resource, date: NaiveDate) -> Result<Vec<SlotRecord>> {
        calendar::goto_month(self, date).await?;
        self.cursor.month = date.with_day(1);

        let previous = self.table_html().await?.unwrap_or_default();
        if !calendar::select_day(self, date).await? {
            debug!(resource = %resource.label, %date, "day not selectable, skipping");
            return Ok(Vec::new());
        }

        let refreshed = calendar::await_table_refresh(
            self,
            &previous,
            Duration::from_secs(self.extraction.table_refresh_timeout_secs),
            Duration::from_millis(self.extraction.poll_interval_ms),
        )
        .await?;
        if !refreshed {
            debug!(resource = %resource.label, %date, "table did not refresh, reading as-is");
        }

        let html = self.table_html().await?.unwrap_or_default();
        Ok(parse_slot_table(&html, date, resource.ordinal))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let session = *self;
        if let Some(window) = &session.cursor.window {
            debug!(?window, month = ?session.cursor.month, "closing browser session");
        }
        session.driver.quit().await.map_err(wderr)
    }
}

#[async_trait]
impl CalendarSurface for BrowserSession {
    async fn header_text(&mut self) -> Result<String> {
        let header = self.find_present(By::Css(SEL_CAL_HEADER)).await?;
        header.text().await.map_err(wderr)
    }

    async fn page_forward(&mut self) -> Result<()> {
        let next = self.find_present(By::Css(SEL_CAL_NEXT)).await?;
        self.js_click(&next).await?;
        // The widget repaints a moment after the click.
        tokio::time::sleep(self.settle()).await;
        Ok(())
    }

    async fn day_cells(&mut self) -> Result<Vec<String>> {
        let cells = self
            .driver
            .find_all(By::Css(SEL_CAL_DAYS))
            .await
            .map_err(wderr)?;
        let mut texts = Vec::with_capacity(cells.len());
        for cell in &cells {
            texts.push(cell.text().await.unwrap_or_default());
        }
        Ok(texts)
    }

    async fn click_day(&mut self, index: usize) -> Result<()> {
        let cells = self
            .driver
            .find_all(By::Css(SEL_CAL_DAYS))
            .await
            .map_err(wderr)?;
        let cell = cells
            .get(index)
            .ok_or_else(|| SessionError::ElementMissing(format!("day cell #{index}")))?;
        self.js_click(cell).await
    }

    async fn table_html(&mut self) -> Result<Option<String>> {
        match self.driver.find(By::Css(SEL_TABLE_BODY)).await {
            Ok(body) => match body.inner_html().await {
                Ok(html) => Ok(Some(html)),
                Err(e) => {
                    // The node can go stale mid-replacement; report
                    // absence and let the caller poll again.
                    warn!(error = %e, "slot table went stale while reading");
                    Ok(None)
                }
            },
            Err(_) => Ok(None),
        }
    }
}
