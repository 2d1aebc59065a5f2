//! HTML rendering of the availability matrix.
//!
//! Output is a standalone styled document: one visual class for
//! available, one for unavailable, neutral for unknown. Blank cells
//! render as unavailable so the document never shows an ambiguous gap.

use chrono::{Datelike, NaiveDate};

use crate::records::{AvailableSlot, ExtractionWindow, SlotStatus};

use super::builder::{AvailabilityMatrix, MatrixOutcome, MatrixRow};

/// Weekday names as the document prints them, Monday first.
const WEEKDAYS: [&str; 7] = [
    "segunda", "terça", "quarta", "quinta", "sexta", "sábado", "domingo",
];

const STYLE: &str = r#"<style>
  body{font-family:Inter,Segoe UI,Roboto,Arial,sans-serif;margin:20px;color:#222;}
  h1{font-size:20px;margin:0 0 8px 0}
  .sub{color:#666;margin-bottom:14px}
  .legend{display:flex;gap:14px;margin:10px 0 18px 0;font-size:13px}
  .dot{display:inline-block;width:10px;height:10px;border-radius:2px;margin-right:6px;vertical-align:middle}
  table{border-collapse:collapse;width:100%;font-size:13px}
  th,td{padding:8px 10px;border-bottom:1px solid #eee;text-align:center;white-space:nowrap}
  tbody tr:nth-child(even){background:#fafafa}
  td.ok{background:#c6efce;border:1px solid #b7ddb9;font-weight:600}
  td.blk{background:#ffe4b5;border:1px solid #f0c88b;font-weight:600}
  td.na{color:#999}
  tr.day-header td{font-weight:700;background:#e0e0e0;border-bottom:2px solid #bbb}
  .footer{margin-top:16px;color:#777;font-size:12px}
</style>"#;

/// The rendered full-grid document plus its summary numbers.
#[derive(Debug, Clone)]
pub struct MatrixDocument {
    pub html: String,
    /// Column labels, ordinal order.
    pub resources: Vec<String>,
    /// Grid rows, day-boundary headers included.
    pub row_count: usize,
    /// Slot records behind the grid.
    pub record_count: usize,
    /// True when the run collected nothing at all.
    pub no_data: bool,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAYS[date.weekday().num_days_from_monday() as usize]
}

fn status_cell(cell: Option<SlotStatus>) -> &'static str {
    match cell {
        Some(SlotStatus::Available) => "<td class='ok'>disponível</td>",
        // A blank cell defaults to unavailable at render time.
        Some(SlotStatus::Unavailable) | None => "<td class='blk'>indisponível</td>",
        Some(SlotStatus::Unknown) => "<td class='na'>&mdash;</td>",
    }
}

fn render_row(row: &MatrixRow, resources: &[String], html: &mut Vec<String>) {
    match &row.time_label {
        None => {
            // Day-boundary header carries the column names.
            let mut tr = String::from("<tr class='day-header'>");
            tr.push_str(&format!("<td>{}</td>", row.date.format("%d/%m/%Y")));
            tr.push_str("<td></td><td>Hora</td>");
            for label in resources {
                tr.push_str(&format!("<td>{}</td>", escape(label)));
            }
            tr.push_str("</tr>");
            html.push(tr);
        }
        Some(label) => {
            let mut tr = String::from("<tr>");
            tr.push_str(&format!("<td>{}</td>", row.date.format("%d/%m/%Y")));
            tr.push_str(&format!("<td>{}</td>", weekday_name(row.date)));
            tr.push_str(&format!("<td>{}</td>", escape(label)));
            for cell in &row.cells {
                tr.push_str(status_cell(*cell));
            }
            tr.push_str("</tr>");
            html.push(tr);
        }
    }
}

fn render_matrix(matrix: &AvailabilityMatrix, window: ExtractionWindow) -> String {
    let mut html = Vec::new();
    html.push("<!doctype html><html><head><meta charset='utf-8'>".to_string());
    html.push(STYLE.to_string());
    html.push("</head><body>".to_string());
    html.push(format!(
        "<h1>Disponibilidade de reservas · {} a {}</h1>",
        window.start.format("%d/%m/%Y"),
        window.end.format("%d/%m/%Y")
    ));

    let mut columns = String::from("Dia · Dia da semana · Hora");
    for label in &matrix.resources {
        columns.push_str(" · ");
        columns.push_str(&escape(label));
    }
    html.push(format!("<div class='sub'>{columns}</div>"));
    html.push(
        "<div class='legend'>\
         <span><span class='dot' style='background:#c6efce;border:1px solid #b7ddb9'></span>Disponível</span>\
         <span><span class='dot' style='background:#ffe4b5;border:1px solid #f0c88b'></span>Indisponível</span>\
         </div>"
            .to_string(),
    );

    html.push("<table><tbody>".to_string());
    for row in &matrix.rows {
        render_row(row, &matrix.resources, &mut html);
    }
    html.push("</tbody></table>".to_string());
    html.push("<div class='footer'>Gerado automaticamente</div>".to_string());
    html.push("</body></html>".to_string());
    html.join("\n")
}

fn render_no_data() -> String {
    format!(
        "<!doctype html><html><head><meta charset='utf-8'>{STYLE}</head><body>\
         <h1>Nenhum dado coletado</h1>\
         <p class='sub'>Sem horários no período, ou bloqueio/erro no portal.</p>\
         </body></html>"
    )
}

/// Render the full-grid document. Always produces a displayable
/// document, even from an empty run.
pub fn render_document(
    outcome: &MatrixOutcome,
    resources: &[crate::records::Resource],
    window: ExtractionWindow,
) -> MatrixDocument {
    match outcome {
        MatrixOutcome::NoData => MatrixDocument {
            html: render_no_data(),
            resources: resources.iter().map(|r| r.label.clone()).collect(),
            row_count: 0,
            record_count: 0,
            no_data: true,
        },
        MatrixOutcome::Matrix(matrix) => MatrixDocument {
            html: render_matrix(matrix, window),
            resources: matrix.resources.clone(),
            row_count: matrix.rows.len(),
            record_count: matrix.to_records().len(),
            no_data: false,
        },
    }
}

/// Render the available-only projection as a plain list document.
pub fn render_available(slots: &[AvailableSlot]) -> String {
    if slots.is_empty() {
        return format!(
            "<!doctype html><html><head><meta charset='utf-8'>{STYLE}</head><body>\
             <h1>Nenhuma disponibilidade encontrada</h1></body></html>"
        );
    }
    let rows: Vec<String> = slots
        .iter()
        .map(|slot| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                slot.date.format("%d/%m/%Y"),
                escape(&slot.time_label),
                escape(&slot.resource_label)
            )
        })
        .collect();
    format!(
        "<!doctype html><html><head><meta charset='utf-8'>{STYLE}</head><body>\
         <h1>Horários disponíveis</h1>\
         <table><thead><tr><th>Data</th><th>Hora</th><th>Recurso</th></tr></thead>\
         <tbody>{}</tbody></table></body></html>",
        rows.join("\n")
    )
}
