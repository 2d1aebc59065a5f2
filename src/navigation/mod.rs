//! Calendar and resource-list navigation.

pub mod calendar;
pub mod directory;

pub use calendar::{
    await_table_refresh, format_header, goto_month, month_end, parse_header, select_day,
    CalendarSurface,
};
pub use directory::{resolve_resources, RawListEntry};
