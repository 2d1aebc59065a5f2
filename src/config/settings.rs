//! Configuration settings for the quadra availability scanner.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            // Current directory
            PathBuf::from("config.toml"),
            PathBuf::from("quadra.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("quadra/config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".quadra/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.portal.login_url.is_empty() {
            return Err(ConfigError::MissingField("portal.login_url".to_string()).into());
        }
        if self.portal.resource_phrase.trim().is_empty() {
            return Err(ConfigError::MissingField("portal.resource_phrase".to_string()).into());
        }
        if self.browser.webdriver_url.is_empty() {
            return Err(ConfigError::MissingField("browser.webdriver_url".to_string()).into());
        }
        if self.http.base_url.is_empty() {
            return Err(ConfigError::MissingField("http.base_url".to_string()).into());
        }
        if self.extraction.max_window_days == 0 {
            return Err(
                ConfigError::Invalid("extraction.max_window_days must be > 0".to_string()).into(),
            );
        }
        if self.extraction.poll_interval_ms == 0 {
            return Err(
                ConfigError::Invalid("extraction.poll_interval_ms must be > 0".to_string()).into(),
            );
        }
        if self.extraction.worker_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "extraction.worker_timeout_secs must be > 0".to_string(),
            )
            .into());
        }
        if self.extraction.discovery_attempts == 0 {
            return Err(ConfigError::Invalid(
                "extraction.discovery_attempts must be > 0".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Portal endpoints and the resource-type phrase to scan for.
///
/// The navigation sequence itself (selectors, frame markers) is tied to
/// this specific portal and lives with the session code; only the
/// endpoints and the target phrase are deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Login form page.
    pub login_url: String,
    /// Authenticated landing area, visited before the reservation list.
    pub entry_url: String,
    /// Reservation list page for the member's unit.
    pub reservations_url: String,
    /// Phrase identifying the resources to extract, matched against
    /// normalized labels (e.g. "quadra de tenis").
    pub resource_phrase: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://bbz.com.br/area-do-cliente/".to_string(),
            entry_url: "https://servc9.webware.com.br/bin/sol/aAreaGeral.asp".to_string(),
            reservations_url: "https://servc9.webware.com.br/bin/aplic/cpMinhaUnidadeReservas.asp"
                .to_string(),
            resource_phrase: "quadra de tenis".to_string(),
        }
    }
}

/// Browser-session (WebDriver) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver).
    pub webdriver_url: String,
    /// Chrome/Chromium binary, when not on the default path.
    pub chrome_binary: Option<String>,
    /// Run the browser headless.
    pub headless: bool,
    /// Page load timeout.
    pub page_load_timeout_secs: u64,
    /// How long to wait for an element to render before giving up.
    pub element_wait_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            chrome_binary: None,
            headless: true,
            page_load_timeout_secs: 60,
            element_wait_secs: 25,
        }
    }
}

/// One entry of the fixed resource table used by the HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResource {
    /// Human label, matched against `portal.resource_phrase`.
    pub label: String,
    /// The portal's opaque resource identifier.
    pub key: String,
}

/// Plain-HTTP backend settings.
///
/// This backend skips the browser entirely and queries the portal's
/// internal day endpoint. It cannot discover resources at runtime; the
/// resource table is fixed per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL of the booking application.
    pub base_url: String,
    /// Session bootstrap page visited after login to establish the
    /// application session.
    pub session_entry_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Fixed resource → identifier table.
    pub resources: Vec<HttpResource>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://icondominio.webware.com.br".to_string(),
            session_entry_url: "https://servc9.webware.com.br/bin/skin/aInicioSkin.asp".to_string(),
            request_timeout_secs: 30,
            resources: default_resource_table(),
        }
    }
}

fn default_resource_table() -> Vec<HttpResource> {
    [
        ("Quadra de Tênis 1", "EF3C995968241BD918646D3859E8532B"),
        ("Quadra de Tênis 2", "8D71C6E07E6E7E8B799AD8C8070067E8"),
        ("Quadra de Tênis 3", "057F54C28308AE8A9914A3B12A42983E"),
        ("Churrasqueira 1", "E288DDCA32C8FFF3F88AE4740E8444DB"),
        ("Churrasqueira 2", "18BA0F8911674F27C5072E67DF160648"),
        ("Churrasqueira 3", "4092AEB140B1856AF190B39176DD1E01"),
    ]
    .into_iter()
    .map(|(label, key)| HttpResource {
        label: label.to_string(),
        key: key.to_string(),
    })
    .collect()
}

/// Extraction pacing, timeouts and window limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Hard budget per resource worker; a worker past it is abandoned
    /// and contributes whatever it had not yet reported (i.e. nothing).
    pub worker_timeout_secs: u64,
    /// How long to wait for the slot table to change after a day click.
    pub table_refresh_timeout_secs: u64,
    /// Poll interval for change-detection waits.
    pub poll_interval_ms: u64,
    /// Settle pause after navigations that replace windows or frames.
    pub settle_ms: u64,
    /// Discovery passes over the resource list before reporting it empty.
    pub discovery_attempts: u32,
    /// Pause between discovery passes.
    pub discovery_backoff_ms: u64,
    /// Maximum window span callers may request, in days.
    pub max_window_days: i64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            worker_timeout_secs: 300,
            table_refresh_timeout_secs: 20,
            poll_interval_ms: 150,
            settle_ms: 800,
            discovery_attempts: 4,
            discovery_backoff_ms: 600,
            max_window_days: 45,
        }
    }
}
