//! The availability matrix: pivot and rendering.

mod builder;
mod render;

pub use builder::{build, build_seeded, AvailabilityMatrix, MatrixOutcome, MatrixRow};
pub use render::{render_available, render_document, MatrixDocument};
