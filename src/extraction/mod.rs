//! Slot-table reading and the parallel extraction pipeline.

pub mod coordinator;
pub mod table;

pub use coordinator::{
    extract_available_only, extract_full, ExtractProgress, ExtractionCoordinator,
};
pub use table::{classify_status, is_whole_day_label, parse_slot_table};
