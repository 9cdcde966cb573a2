//! Result file rendering
//!
//! Output is a fixed header followed by one `identifier,fom,tom,grad` line per
//! record, in input order, with no trailing newline after the last record.
//! Fields are not escaped: identifiers never contain commas or newlines.

use chrono::NaiveDate;
use sluice_common::types::ResultRecord;

/// Header line of every result file
pub const HEADER: &str = "fødselsnummer,fom,tom,grad";

/// Render records into a result file payload
pub fn serialize(records: &[ResultRecord]) -> String {
    let lines: Vec<String> = records.iter().map(render_record).collect();
    format!("{}\n{}", HEADER, lines.join("\n"))
}

fn render_record(record: &ResultRecord) -> String {
    format!(
        "{},{},{},{}",
        record.identifier,
        render_date(record.period_start),
        render_date(record.period_end),
        render_grade(record.grade)
    )
}

fn render_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

/// Grades always carry a decimal part (`100.0`, `69.5`)
fn render_grade(grade: f64) -> String {
    format!("{:?}", grade)
}
