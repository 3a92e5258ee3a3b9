use std::path::Path;

use chrono::NaiveDate;

use crate::error::{ExportError, Result};
use crate::models::LeadRecord;

/// Render records as CSV. The header comes from the first record's keys,
/// blank columns included; any record writes an empty cell where it has no
/// value for one of those keys. Cells holding a comma, quote or line break
/// are quoted, with embedded quotes doubled.
pub fn to_csv(records: &[LeadRecord]) -> std::result::Result<String, ExportError> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };
    let headers: Vec<String> = first.columns().into_iter().map(str::to_string).collect();

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&headers)?;
    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|key| record.get(key).map(|v| v.into_owned()).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn default_file_name(today: NaiveDate) -> String {
    format!("lead_data_{}.csv", today.format("%Y-%m-%d"))
}

pub fn write_csv_file(path: &Path, records: &[LeadRecord]) -> Result<usize> {
    let content = to_csv(records)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), rows = records.len(), "exported CSV");
    Ok(records.len())
}
