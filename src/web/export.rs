//! Flat tabular export of the fill report.

use crate::error::{Result, StationError};
use crate::telemetry::FillReport;
use chrono::{DateTime, Local};

/// Column headers of the CSV export.
pub const CSV_HEADER: [&str; 5] = ["Type", "Phase", "Timestamp", "Level", "Temperature"];

/// Render the event history as CSV, one row per event in insertion order.
pub fn report_csv(report: &FillReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for event in &report.events {
        let phase = event.phase.to_string();
        writer.write_record([
            event.kind.as_str(),
            phase.as_str(),
            event.timestamp.as_str(),
            event.level.as_str(),
            event.temperature.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StationError::export_error(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StationError::export_error(e.to_string()))
}

/// Download filename for a CSV export taken at `now`.
pub fn csv_filename(now: DateTime<Local>) -> String {
    format!("fill_report_{}.csv", now.format("%Y-%m-%d_%H-%M"))
}
