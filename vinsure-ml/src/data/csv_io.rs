//! CSV reading and writing for [`DataBatch`].
//!
//! Files carry a header row and no index column. Cells are typed on read:
//! null markers, integers, floats, booleans, then strings.

use crate::data::batch::DataBatch;
use crate::error::PipelineError;
use serde_json::{Number, Value};
use std::path::Path;

/// Cell texts read back as a missing value.
const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "None"];

/// Parse one CSV cell into a typed value.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if NULL_MARKERS.contains(&s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = s.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match s {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Render a value as CSV cell text.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a CSV file into a batch.
pub fn read_csv(path: &Path) -> Result<DataBatch, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(PipelineError::dataset(format!(
            "empty CSV file: {}",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(parse_cell).collect());
    }

    tracing::debug!(
        path = %path.display(),
        rows = rows.len(),
        columns = columns.len(),
        "Read CSV"
    );
    DataBatch::new(columns, rows)
}

/// Write a batch as CSV, replacing any existing file and creating parent directories.
pub fn write_csv(path: &Path, batch: &DataBatch) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&batch.columns)?;
    for row in &batch.rows {
        writer.write_record(row.iter().map(format_cell))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))?;
    vinsure_core::persistence::atomic_write(path, &bytes)?;

    tracing::debug!(
        path = %path.display(),
        rows = batch.row_count(),
        "Wrote CSV"
    );
    Ok(())
}
