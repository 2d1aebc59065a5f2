//! Error types for the quadra availability scanner.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for quadra operations.
#[derive(Error, Debug)]
pub enum QuadraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuadraError {
    /// Whether this error means no session could be established at all.
    /// This is the only condition that aborts a whole extraction run;
    /// everything else degrades to fewer records.
    pub fn is_authentication(&self) -> bool {
        matches!(self, QuadraError::Session(SessionError::Authentication(_)))
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Session-related errors (authentication, browser driving, HTTP).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Element not found: {0}")]
    ElementMissing(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

/// Calendar navigation errors. These are per-date conditions; the caller
/// skips the date rather than aborting the run.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Unparseable calendar header: '{0}'")]
    UnparseableHeader(String),

    #[error("Calendar never reached {target} after {pages} page turns")]
    MonthOutOfReach { target: NaiveDate, pages: u32 },
}

/// Extraction-related errors. Per-resource conditions; the affected
/// resource contributes zero records.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Resource discovery failed: {0}")]
    ResourceDiscoveryFailed(String),

    #[error("Extraction timed out for '{resource}' after {seconds}s")]
    Timeout { resource: String, seconds: u64 },
}

/// Result type alias for quadra operations.
pub type Result<T> = std::result::Result<T, QuadraError>;
