//! Navigation over the portal's month-calendar widget.
//!
//! The widget replaces its content asynchronously: paging the month,
//! selecting a day and the slot-table refresh all happen some time after
//! the triggering click. Every operation here therefore re-reads state
//! instead of trusting its last observation, and the waits are
//! poll-until-changed rather than fixed sleeps.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Days, Months, NaiveDate};
use regex::Regex;

use crate::error::{NavigationError, Result};
use crate::text::normalize;

/// Month names as the portal renders calendar headers, in month order,
/// in normalized form.
const MONTH_NAMES: [&str; 12] = [
    "janeiro", "fevereiro", "marco", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

/// Extra page turns tolerated beyond the worst case before concluding
/// the widget is stuck.
const PAGE_SLACK: u32 = 1;

static HEADER_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{L}+)\s+(\d{4})").unwrap());

/// What the navigator needs from whatever renders the calendar. The
/// browser session implements this against the live widget; tests drive
/// the navigator with scripted fakes.
#[async_trait]
pub trait CalendarSurface: Send {
    /// Text of the month header as currently displayed.
    async fn header_text(&mut self) -> Result<String>;

    /// Click the next-month control. The displayed month changes some
    /// time later; callers must re-read the header.
    async fn page_forward(&mut self) -> Result<()>;

    /// Day-of-month texts of the selectable day cells. The surface
    /// pre-filters cells belonging to other months or disabled days.
    async fn day_cells(&mut self) -> Result<Vec<String>>;

    /// Click the nth selectable day cell.
    async fn click_day(&mut self, index: usize) -> Result<()>;

    /// Inner HTML of the slot table body, if it is present at all.
    async fn table_html(&mut self) -> Result<Option<String>>;
}

/// Month number (1-12) for a localized month name, matched after
/// normalization so accents and casing never matter.
pub fn month_from_name(name: &str) -> Option<u32> {
    let folded = normalize(name);
    MONTH_NAMES
        .iter()
        .position(|m| *m == folded)
        .map(|i| i as u32 + 1)
}

/// Canonical header text for a month; `parse_header` is its inverse.
pub fn format_header(month: u32, year: i32) -> String {
    let name = MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{name} {year}")
}

/// Parse a calendar header into the first day of the displayed month.
///
/// Tries the direct "month year" token form first, then falls back to
/// finding a month name followed by a 4-digit year anywhere in the
/// string. Anything else is `UnparseableHeader` - never a silently
/// wrong date.
pub fn parse_header(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() >= 2 {
        if let (Some(month), Ok(year)) = (
            month_from_name(parts[0]),
            parts[parts.len() - 1].parse::<i32>(),
        ) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return Ok(date);
            }
        }
    }

    for caps in HEADER_FALLBACK_RE.captures_iter(trimmed) {
        if let Some(month) = month_from_name(&caps[1]) {
            if let Ok(year) = caps[2].parse::<i32>() {
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                    return Ok(date);
                }
            }
        }
    }

    Err(NavigationError::UnparseableHeader(trimmed.to_string()).into())
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).expect("day 1 exists in every month");
    first + Months::new(1) - Days::new(1)
}

/// Page the calendar forward until the displayed month contains or
/// follows `target`. Terminates because every turn strictly advances
/// the displayed month; a hard bound of `12 * years_spanned + 1` turns
/// (plus slack) catches a widget that stops advancing.
pub async fn goto_month<S: CalendarSurface + ?Sized>(
    surface: &mut S,
    target: NaiveDate,
) -> Result<()> {
    let first_displayed = parse_header(&surface.header_text().await?)?;
    let years_spanned = (target.year() - first_displayed.year()).max(0) as u32 + 1;
    let bound = 12 * years_spanned + 1 + PAGE_SLACK;

    let mut displayed = first_displayed;
    let mut pages = 0u32;
    while month_end(displayed) < target {
        if pages >= bound {
            return Err(NavigationError::MonthOutOfReach { target, pages }.into());
        }
        surface.page_forward().await?;
        pages += 1;
        displayed = parse_header(&surface.header_text().await?)?;
    }
    Ok(())
}

/// Select the day cell matching `target`'s day of month. The surface
/// already filtered out other-month and disabled cells, so the first
/// text match is the right one. `false` means the day is not selectable
/// and the caller should move on to the next date.
pub async fn select_day<S: CalendarSurface + ?Sized>(
    surface: &mut S,
    target: NaiveDate,
) -> Result<bool> {
    let wanted = target.day().to_string();
    let cells = surface.day_cells().await?;
    for (index, cell) in cells.iter().enumerate() {
        if cell.trim() == wanted {
            surface.click_day(index).await?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Wait for the slot table to be present and different from
/// `previous`, polling at `poll` intervals up to `timeout`.
///
/// A timeout is not an error: the caller reads whatever content is
/// present and treats an empty read as "no data for that date". Read
/// errors during the wait are swallowed for the same reason - the table
/// may be mid-replacement.
pub async fn await_table_refresh<S: CalendarSurface + ?Sized>(
    surface: &mut S,
    previous: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<bool> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(html)) = surface.table_html().await {
            if !html.is_empty() && html != previous {
                return Ok(true);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll).await;
    }
}
