//! Reading the rendered slot table into structured records.
//!
//! Both backends hand this module an HTML fragment of the slot table:
//! the browser session reads the table body's innerHTML, the HTTP
//! session passes the day endpoint's response. One parser, one set of
//! classification rules.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::records::{SlotRecord, SlotStatus};
use crate::text::normalize;

/// Stems of the portal's "unavailable"-family status vocabulary, matched
/// against normalized status text. Kept in one place so the
/// classification rules can be enumerated by tests.
const UNAVAILABLE_STEMS: [&str; 3] = ["indispon", "reservad", "bloquead"];

/// Normalized form of the label the portal uses for day-level blocking.
const WHOLE_DAY_LABEL: &str = "integral";

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TIME_CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td.integral").unwrap());
static ACTION_CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.reservar").unwrap());
static STATUS_CLASS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.indisponivel, td.disponivel").unwrap());
static BUTTON_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("button").unwrap());

static TIME_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{2}:\d{2}").unwrap());

/// Whether a time label is the portal's whole-day marker.
pub fn is_whole_day_label(label: &str) -> bool {
    normalize(label) == WHOLE_DAY_LABEL
}

/// Classify one slot from its row evidence: a reserve affordance always
/// wins; otherwise the status cell's own text decides, and text outside
/// the known vocabulary stays `Unknown` rather than guessing.
pub fn classify_status(has_reserve_action: bool, status_text: &str) -> SlotStatus {
    if has_reserve_action {
        return SlotStatus::Available;
    }
    let folded = normalize(status_text);
    if UNAVAILABLE_STEMS.iter().any(|stem| folded.contains(stem)) {
        SlotStatus::Unavailable
    } else {
        SlotStatus::Unknown
    }
}

/// Canonical time label for a cell: the first `HH:MM` token when the
/// cell carries one ("06:00 às 07:00" → "06:00"), else the trimmed text
/// (which is how the whole-day marker comes through).
fn canonical_time_label(raw: &str) -> String {
    match TIME_TOKEN_RE.find(raw) {
        Some(token) => token.as_str().to_string(),
        None => raw.trim().to_string(),
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// A reserve affordance is a button inviting the user to book: either
/// its visible text or its onclick payload mentions the booking action.
fn has_reserve_affordance(row: ElementRef<'_>) -> bool {
    row.select(&BUTTON_SEL).any(|button| {
        normalize(&button.text().collect::<String>()).contains("reserv")
            || button
                .attr("onclick")
                .map(|onclick| normalize(onclick).contains("reserva"))
                .unwrap_or(false)
    })
}

/// Status text for a row without a reserve affordance: the action cell's
/// own text, then an explicitly status-classed cell, then the second
/// cell (the shape the day endpoint renders).
fn status_text(row: ElementRef<'_>, cells: &[ElementRef<'_>]) -> Option<String> {
    if let Some(action_cell) = row.select(&ACTION_CELL_SEL).next() {
        let text = cell_text(action_cell);
        if !text.is_empty() {
            return Some(text);
        }
    }
    if let Some(marked) = row.select(&STATUS_CLASS_SEL).next() {
        return Some(cell_text(marked));
    }
    cells.get(1).map(|cell| cell_text(*cell))
}

fn parse_row(row: ElementRef<'_>) -> Option<(String, SlotStatus)> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SEL).collect();
    if cells.is_empty() {
        return None;
    }

    let time_cell = row.select(&TIME_CELL_SEL).next().unwrap_or(cells[0]);
    let raw_time = cell_text(time_cell);
    if raw_time.is_empty() {
        return None;
    }

    if has_reserve_affordance(row) {
        return Some((canonical_time_label(&raw_time), SlotStatus::Available));
    }

    let status = status_text(row, &cells)?;
    Some((
        canonical_time_label(&raw_time),
        classify_status(false, &status),
    ))
}

/// Read every visible row of a slot-table fragment. A malformed row is
/// skipped on its own; it never aborts the rest of the table.
pub fn parse_slot_table(html: &str, date: NaiveDate, resource_ordinal: usize) -> Vec<SlotRecord> {
    // The HTML parser drops <tr>/<td> that appear outside a table, and
    // the browser session hands us the table body's innerHTML. Re-wrap
    // bare row fragments so they survive parsing.
    let fragment = if html.to_ascii_lowercase().contains("<table") {
        Html::parse_document(html)
    } else {
        Html::parse_document(&format!("<table><tbody>{html}</tbody></table>"))
    };
    let mut records = Vec::new();
    for row in fragment.select(&ROW_SEL) {
        match parse_row(row) {
            Some((time_label, status)) => records.push(SlotRecord {
                date,
                resource_ordinal,
                time_label,
                status,
            }),
            None => debug!(%date, resource_ordinal, "skipping unreadable table row"),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_reserve_button_classifies_available() {
        let html = r#"
            <tr>
              <td class="integral">06:00 às 07:00</td>
              <td class="reservar"><button onclick="reservaAmbiente('/x')">RESERVAR</button></td>
            </tr>
        "#;
        let records = parse_slot_table(html, date(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_label, "06:00");
        assert_eq!(records[0].status, SlotStatus::Available);
    }

    #[test]
    fn test_unavailable_family_tokens() {
        for status in ["INDISPONÍVEL", "Reservado", "Bloqueado"] {
            assert_eq!(
                classify_status(false, status),
                SlotStatus::Unavailable,
                "{status} should classify unavailable"
            );
        }
    }

    #[test]
    fn test_unrecognized_status_stays_unknown() {
        assert_eq!(classify_status(false, "manutenção"), SlotStatus::Unknown);
        assert_eq!(classify_status(false, ""), SlotStatus::Unknown);
        // text-only "available" is not proof of a bookable slot
        assert_eq!(classify_status(false, "DISPONÍVEL"), SlotStatus::Unknown);
    }

    #[test]
    fn test_reserve_action_wins_over_text() {
        assert_eq!(classify_status(true, "indisponível"), SlotStatus::Available);
    }

    #[test]
    fn test_status_cell_text_without_button() {
        let html = r#"
            <tr>
              <td class="integral">07:00 às 08:00</td>
              <td class="reservar">Indisponível</td>
            </tr>
        "#;
        let records = parse_slot_table(html, date(), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SlotStatus::Unavailable);
        assert_eq!(records[0].resource_ordinal, 1);
    }

    #[test]
    fn test_day_endpoint_row_shape() {
        // The HTTP day endpoint renders plain cells: time, status, action.
        let html = r#"
            <table><tbody>
              <tr><td>06:00 às 07:00</td><td>DISPONÍVEL</td><td><button onclick="reservaAmbiente('/Reservas/Condicao?x=1')">Reservar</button></td></tr>
              <tr><td>07:00 às 08:00</td><td>INDISPONÍVEL</td><td></td></tr>
            </tbody></table>
        "#;
        let records = parse_slot_table(html, date(), 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time_label, "06:00");
        assert_eq!(records[0].status, SlotStatus::Available);
        assert_eq!(records[1].status, SlotStatus::Unavailable);
    }

    #[test]
    fn test_whole_day_marker_row() {
        let html = r#"
            <tr>
              <td class="integral">Integral</td>
              <td class="reservar">Indisponível</td>
            </tr>
        "#;
        let records = parse_slot_table(html, date(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_label, "Integral");
        assert!(is_whole_day_label(&records[0].time_label));
        assert_eq!(records[0].status, SlotStatus::Unavailable);
    }

    #[test]
    fn test_malformed_row_is_skipped_not_fatal() {
        let html = r#"
            <tr><th>Hora</th><th>Status</th></tr>
            <tr><td></td><td>Indisponível</td></tr>
            <tr><td class="integral">08:00 às 09:00</td><td class="reservar">Indisponível</td></tr>
        "#;
        let records = parse_slot_table(html, date(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_label, "08:00");
    }

    #[test]
    fn test_empty_fragment_yields_no_records() {
        assert!(parse_slot_table("", date(), 0).is_empty());
        assert!(parse_slot_table("<div>nada por aqui</div>", date(), 0).is_empty());
    }

    #[test]
    fn test_status_class_fallback_cell() {
        let html = r#"
            <tr>
              <td class="integral">09:00 às 10:00</td>
              <td class="reservar"></td>
              <td class="indisponivel">Indisponível</td>
            </tr>
        "#;
        let records = parse_slot_table(html, date(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SlotStatus::Unavailable);
    }

    #[test]
    fn test_whole_day_label_detection() {
        assert!(is_whole_day_label("Integral"));
        assert!(is_whole_day_label("INTEGRAL "));
        assert!(!is_whole_day_label("06:00"));
        assert!(!is_whole_day_label(""));
    }
}
