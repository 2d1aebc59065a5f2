//! Quadra: availability scanner for a condominium reservation portal.
//!
//! Drives an authenticated session through the portal's booking UI (or
//! its internal HTTP endpoint, where usable), walks the calendar for
//! every discovered court, and reduces the rendered slot tables into a
//! single date×time×court availability matrix.

pub mod config;
pub mod error;
pub mod extraction;
pub mod jobs;
pub mod matrix;
pub mod navigation;
pub mod records;
pub mod session;
pub mod text;

pub use config::Config;
pub use error::{
    ConfigError, ExtractionError, NavigationError, QuadraError, Result, SessionError,
};
pub use extraction::{
    extract_available_only, extract_full, ExtractProgress, ExtractionCoordinator,
};
pub use jobs::{JobRecord, JobStatus, JobStore, MemoryJobStore};
pub use matrix::{build, render_available, AvailabilityMatrix, MatrixDocument, MatrixOutcome};
pub use records::{
    AvailableSlot, Credentials, ExtractionWindow, Resource, SlotRecord, SlotStatus,
};
pub use session::{BrowserPortal, HttpPortal, Portal, PortalSession};
