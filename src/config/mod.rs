//! Configuration for the quadra availability scanner.

mod settings;

pub use settings::{
    BrowserConfig, Config, ExtractionConfig, HttpConfig, HttpResource, PortalConfig,
};
