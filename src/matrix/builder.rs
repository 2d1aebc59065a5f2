//! Pivot of slot records into the date×time×resource grid.
//!
//! The builder never raises on missing data: absent cells stay blank
//! (the renderer defaults them), and only a completely empty record set
//! turns into the explicit no-data outcome.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveTime};

use crate::extraction::table::is_whole_day_label;
use crate::records::{Resource, SlotRecord, SlotStatus};

/// One grid row: a day-boundary header or one time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub date: NaiveDate,
    /// `None` marks a day-boundary header pseudo-row.
    pub time_label: Option<String>,
    /// One cell per resource, ordinal order. A `None` cell renders as
    /// unavailable - blanks are never left ambiguous in the output.
    pub cells: Vec<Option<SlotStatus>>,
}

impl MatrixRow {
    pub fn is_header(&self) -> bool {
        self.time_label.is_none()
    }
}

/// The derived date×time×resource view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityMatrix {
    /// Column labels in ordinal order; resources with zero observed
    /// records still appear.
    pub resources: Vec<String>,
    /// Distinct non-whole-day time labels observed in the window.
    pub catalog: Vec<String>,
    /// Dates that required whole-day expansion and carry a header row.
    pub header_dates: Vec<NaiveDate>,
    pub rows: Vec<MatrixRow>,
}

impl AvailabilityMatrix {
    /// Flatten the grid back to records. Header rows and blank cells
    /// produce nothing; feeding the result through `build_seeded` with
    /// this matrix's `header_dates` reproduces the matrix exactly.
    pub fn to_records(&self) -> Vec<SlotRecord> {
        let mut records = Vec::new();
        for row in &self.rows {
            let Some(label) = &row.time_label else {
                continue;
            };
            for (ordinal, cell) in row.cells.iter().enumerate() {
                if let Some(status) = cell {
                    records.push(SlotRecord {
                        date: row.date,
                        resource_ordinal: ordinal,
                        time_label: label.clone(),
                        status: *status,
                    });
                }
            }
        }
        records
    }
}

/// Result of building a matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixOutcome {
    /// The record set was completely empty. Distinct from "everything
    /// unavailable" - the caller renders an explicit no-data document.
    NoData,
    Matrix(AvailabilityMatrix),
}

/// Sort key for time labels: unparsable labels sort before parsed
/// ones, parsed ones by clock time, ties by text.
fn label_sort_key(label: &str) -> (bool, NaiveTime, String) {
    match NaiveTime::parse_from_str(label, "%H:%M") {
        Ok(time) => (true, time, label.to_string()),
        Err(_) => (false, NaiveTime::MIN, label.to_string()),
    }
}

fn row_sort_key(row: &MatrixRow) -> (NaiveDate, u8, (bool, NaiveTime, String)) {
    match &row.time_label {
        // Header rows lead their date group.
        None => (row.date, 0, (false, NaiveTime::MIN, String::new())),
        Some(label) => (row.date, 1, label_sort_key(label)),
    }
}

/// Build the matrix from a flat record set.
pub fn build(records: &[SlotRecord], resources: &[Resource]) -> MatrixOutcome {
    build_seeded(records, resources, &BTreeSet::new())
}

/// Build the matrix, carrying day-boundary headers from an earlier
/// pass. `build` seeds this with no headers; re-running the pipeline on
/// a matrix's own flattened output goes through here.
pub fn build_seeded(
    records: &[SlotRecord],
    resources: &[Resource],
    carried_headers: &BTreeSet<NaiveDate>,
) -> MatrixOutcome {
    if records.is_empty() {
        return MatrixOutcome::NoData;
    }

    let width = resources.len();

    // 1. Catalog: every distinct real time label in the window.
    let distinct: BTreeSet<&str> = records
        .iter()
        .filter(|r| !is_whole_day_label(&r.time_label))
        .map(|r| r.time_label.as_str())
        .collect();
    let mut catalog: Vec<String> = distinct.into_iter().map(str::to_string).collect();
    catalog.sort_by_key(|label| label_sort_key(label));

    // 2. Whole-day expansion: a (date, resource) pair whose sole record
    // is a whole-day unavailable marker becomes one unavailable record
    // per catalog label, and its date gets a day-boundary header.
    let mut groups: BTreeMap<(NaiveDate, usize), Vec<&SlotRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.date, record.resource_ordinal))
            .or_default()
            .push(record);
    }

    let mut header_dates: BTreeSet<NaiveDate> = carried_headers.clone();
    let mut working: Vec<SlotRecord> = Vec::with_capacity(records.len());
    for ((date, ordinal), group) in groups {
        let whole_day_block = group.len() == 1
            && is_whole_day_label(&group[0].time_label)
            && group[0].status == SlotStatus::Unavailable;
        if whole_day_block {
            header_dates.insert(date);
            for label in &catalog {
                working.push(SlotRecord {
                    date,
                    resource_ordinal: ordinal,
                    time_label: label.clone(),
                    status: SlotStatus::Unavailable,
                });
            }
        } else {
            working.extend(group.into_iter().cloned());
        }
    }

    // 3. Pivot into (date, time) rows with one cell per resource,
    // first observation wins.
    let mut pivot: BTreeMap<(NaiveDate, String), Vec<Option<SlotStatus>>> = BTreeMap::new();
    for record in &working {
        if record.resource_ordinal >= width {
            continue;
        }
        let cells = pivot
            .entry((record.date, record.time_label.clone()))
            .or_insert_with(|| vec![None; width]);
        if cells[record.resource_ordinal].is_none() {
            cells[record.resource_ordinal] = Some(record.status);
        }
    }

    // 4. Header pseudo-rows for every expanded date.
    let mut rows: Vec<MatrixRow> = pivot
        .into_iter()
        .map(|((date, label), cells)| MatrixRow {
            date,
            time_label: Some(label),
            cells,
        })
        .collect();
    for date in &header_dates {
        rows.push(MatrixRow {
            date: *date,
            time_label: None,
            cells: vec![None; width],
        });
    }

    // 5. Deterministic order, whatever order the workers finished in.
    rows.sort_by(|a, b| row_sort_key(a).cmp(&row_sort_key(b)));

    MatrixOutcome::Matrix(AvailabilityMatrix {
        resources: resources.iter().map(|r| r.label.clone()).collect(),
        catalog,
        header_dates: header_dates.into_iter().collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn resource(ordinal: usize, label: &str) -> Resource {
        Resource {
            ordinal,
            label: label.to_string(),
            stable_key: Some(ordinal as u32 + 1),
            position: ordinal,
        }
    }

    fn record(d: u32, ordinal: usize, label: &str, status: SlotStatus) -> SlotRecord {
        SlotRecord {
            date: date(d),
            resource_ordinal: ordinal,
            time_label: label.to_string(),
            status,
        }
    }

    fn two_resources() -> Vec<Resource> {
        vec![resource(0, "Quadra 1"), resource(1, "Quadra 2")]
    }

    fn unwrap_matrix(outcome: MatrixOutcome) -> AvailabilityMatrix {
        match outcome {
            MatrixOutcome::Matrix(matrix) => matrix,
            MatrixOutcome::NoData => panic!("expected a matrix"),
        }
    }

    #[test]
    fn test_empty_records_is_no_data() {
        assert_eq!(build(&[], &two_resources()), MatrixOutcome::NoData);
    }

    #[test]
    fn test_catalog_excludes_whole_day_label() {
        let records = vec![
            record(1, 0, "06:00", SlotStatus::Available),
            record(1, 0, "07:00", SlotStatus::Unavailable),
            record(2, 1, "Integral", SlotStatus::Unavailable),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert_eq!(matrix.catalog, vec!["06:00", "07:00"]);
    }

    #[test]
    fn test_whole_day_expansion() {
        // Catalog {06:00, 07:00} from resource 1; resource 0's sole
        // record on day 1 is a whole-day block.
        let records = vec![
            record(1, 0, "Integral", SlotStatus::Unavailable),
            record(1, 1, "06:00", SlotStatus::Available),
            record(1, 1, "07:00", SlotStatus::Available),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));

        let expanded: Vec<_> = matrix
            .to_records()
            .into_iter()
            .filter(|r| r.resource_ordinal == 0)
            .collect();
        assert_eq!(expanded.len(), 2);
        assert!(expanded
            .iter()
            .all(|r| r.status == SlotStatus::Unavailable));
        assert_eq!(
            expanded.iter().map(|r| r.time_label.as_str()).collect::<Vec<_>>(),
            vec!["06:00", "07:00"]
        );

        // A header row leads the expanded date's block.
        assert_eq!(matrix.header_dates, vec![date(1)]);
        assert!(matrix.rows[0].is_header());
        assert_eq!(matrix.rows[0].date, date(1));
    }

    #[test]
    fn test_whole_day_marker_with_siblings_is_kept_verbatim() {
        let records = vec![
            record(1, 0, "Integral", SlotStatus::Unavailable),
            record(1, 0, "06:00", SlotStatus::Available),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert!(matrix.header_dates.is_empty());
        assert!(matrix
            .rows
            .iter()
            .any(|r| r.time_label.as_deref() == Some("Integral")));
    }

    #[test]
    fn test_available_whole_day_marker_is_not_expanded() {
        let records = vec![
            record(1, 0, "Integral", SlotStatus::Available),
            record(1, 1, "06:00", SlotStatus::Unavailable),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert!(matrix.header_dates.is_empty());
    }

    #[test]
    fn test_first_observation_wins() {
        let records = vec![
            record(1, 0, "06:00", SlotStatus::Available),
            record(1, 0, "06:00", SlotStatus::Unavailable),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert_eq!(matrix.rows[0].cells[0], Some(SlotStatus::Available));
    }

    #[test]
    fn test_zero_record_resource_still_has_a_column() {
        let records = vec![record(1, 0, "06:00", SlotStatus::Available)];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert_eq!(matrix.resources, vec!["Quadra 1", "Quadra 2"]);
        assert_eq!(matrix.rows[0].cells.len(), 2);
        assert_eq!(matrix.rows[0].cells[1], None);
    }

    #[test]
    fn test_rows_sorted_by_date_then_time() {
        let records = vec![
            record(2, 0, "07:00", SlotStatus::Available),
            record(1, 0, "08:00", SlotStatus::Available),
            record(1, 0, "06:00", SlotStatus::Available),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        let order: Vec<_> = matrix
            .rows
            .iter()
            .map(|r| (r.date, r.time_label.clone().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                (date(1), "06:00".to_string()),
                (date(1), "08:00".to_string()),
                (date(2), "07:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_unparsable_label_sorts_before_parsed_ones() {
        let records = vec![
            record(1, 0, "06:00", SlotStatus::Available),
            record(1, 0, "manhã", SlotStatus::Unavailable),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert_eq!(matrix.rows[0].time_label.as_deref(), Some("manhã"));
        assert_eq!(matrix.rows[1].time_label.as_deref(), Some("06:00"));
    }

    #[test]
    fn test_rebuild_of_own_output_is_identical() {
        let records = vec![
            record(1, 0, "Integral", SlotStatus::Unavailable),
            record(1, 1, "06:00", SlotStatus::Available),
            record(1, 1, "07:00", SlotStatus::Unavailable),
            record(2, 0, "06:00", SlotStatus::Unknown),
        ];
        let resources = two_resources();
        let first = unwrap_matrix(build(&records, &resources));

        let carried: BTreeSet<NaiveDate> = first.header_dates.iter().copied().collect();
        let second = unwrap_matrix(build_seeded(&first.to_records(), &resources, &carried));
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_from_unknown_ordinal_is_dropped() {
        let records = vec![
            record(1, 0, "06:00", SlotStatus::Available),
            record(1, 7, "06:00", SlotStatus::Available),
        ];
        let matrix = unwrap_matrix(build(&records, &two_resources()));
        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].cells.len(), 2);
    }
}
