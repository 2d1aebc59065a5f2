//! Core domain records shared across the extraction pipeline.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A single bookable unit (one court) discovered on the portal.
///
/// Resources are discovered once per extraction run and immutable
/// thereafter; ordinals are dense from zero and stable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Dense ordinal assigned at discovery.
    pub ordinal: usize,
    /// Human label as the portal renders it.
    pub label: String,
    /// Numeric token embedded in the label, when present. Used for
    /// deterministic ordering when text order is unreliable.
    pub stable_key: Option<u32>,
    /// Raw position in the portal's list, used to re-locate the entry.
    pub position: usize,
}

/// Classified state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Unavailable,
    Unknown,
}

/// One observed slot for one resource on one date. Immutable once
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub date: NaiveDate,
    pub resource_ordinal: usize,
    /// Literal time label, or the portal's whole-day sentinel when the
    /// portal reports day-level blocking.
    pub time_label: String,
    pub status: SlotStatus,
}

/// Inclusive date window for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExtractionWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Every date in the window, in order, both ends included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Caller-side guard: end must not precede start and the span must
    /// stay within `max_days`. Window validation belongs to the caller,
    /// not the extraction core; this helper is what callers use.
    pub fn validate_span(&self, max_days: i64) -> Result<()> {
        if self.end < self.start {
            return Err(ConfigError::Invalid(format!(
                "window end {} precedes start {}",
                self.end, self.start
            ))
            .into());
        }
        let span = (self.end - self.start).num_days();
        if span > max_days {
            return Err(ConfigError::Invalid(format!(
                "window spans {span} days, maximum is {max_days}"
            ))
            .into());
        }
        Ok(())
    }
}

impl fmt::Display for ExtractionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One row of the available-only projection. Field order gives the
/// derived ordering the contract sort: `(date, time, resource)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub time_label: String,
    pub resource_label: String,
}

/// Portal credentials handed to the session factory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs and error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
