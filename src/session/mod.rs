//! Portal session backends.
//!
//! One contract, two interchangeable implementations: a WebDriver-driven
//! browser session for the portal's real UI, and a plain-HTTP session
//! for deployments where the portal's internal day endpoint is usable
//! directly.

mod browser;
mod http;
mod traits;

pub use browser::BrowserPortal;
pub use http::HttpPortal;
pub use traits::{Portal, PortalSession};
