//! Tabular persistence of fetched replies
//!
//! One CSV row per record. Columns are the union of all record fields in
//! first-seen order. The `message` column holds plain text so the file stays
//! readable in a spreadsheet; every other cell holds the compact JSON
//! encoding of its value, which makes the write/read round trip exact. An
//! empty cell means the record did not have that field.

use crate::models::Record;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tabular store errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON in column '{column}' of row {row}: {source}")]
    Json {
        column: String,
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Table {} has no message column", .0.display())]
    MissingMessageColumn(PathBuf),
}

/// Column order for a batch: first-seen order across all records
fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.fields().keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    if !columns.iter().any(|c| c == Record::MESSAGE_FIELD) {
        columns.push(Record::MESSAGE_FIELD.to_string());
    }
    columns
}

fn encode_cell(column: &str, value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(text)) if column == Record::MESSAGE_FIELD => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `records` to `path`, replacing any previous file
///
/// The file is written next to its destination and renamed into place, so a
/// reader never observes a half-written table. The temp file is removed again
/// when anything fails. Returns the row count.
pub fn write_records(path: &Path, records: &[Record]) -> Result<usize, PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    let result = write_table(&tmp_path, records)
        .and_then(|columns| fs::rename(&tmp_path, path).map(|()| columns).map_err(Into::into));

    let columns = match result {
        Ok(columns) => columns,
        Err(e) => {
            if tmp_path.exists() {
                if let Err(remove_err) = fs::remove_file(&tmp_path) {
                    tracing::warn!(
                        path = %tmp_path.display(),
                        error = %remove_err,
                        "Failed to remove temp table"
                    );
                }
            }
            return Err(e);
        }
    };

    tracing::debug!(
        path = %path.display(),
        rows = records.len(),
        columns = columns,
        "Wrote reply table"
    );

    Ok(records.len())
}

/// Write header and rows to `tmp_path`, synced; returns the column count
fn write_table(tmp_path: &Path, records: &[Record]) -> Result<usize, PersistenceError> {
    let columns = collect_columns(records);

    let mut writer = csv::Writer::from_path(tmp_path)?;
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| encode_cell(column, record.get(column)))
            .collect();
        writer.write_record(&row)?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| PersistenceError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(columns.len())
}

/// Read a table written by [`write_records`]
pub fn read_records(path: &Path) -> Result<Vec<Record>, PersistenceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    if !headers.iter().any(|h| h == Record::MESSAGE_FIELD) {
        return Err(PersistenceError::MissingMessageColumn(path.to_path_buf()));
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let mut fields = Map::new();

        for (column, cell) in headers.iter().zip(row.iter()) {
            if column == Record::MESSAGE_FIELD {
                fields.insert(column.clone(), Value::String(cell.to_string()));
                continue;
            }
            if cell.is_empty() {
                continue;
            }
            let value = serde_json::from_str(cell).map_err(|source| PersistenceError::Json {
                column: column.clone(),
                row: index + 1,
                source,
            })?;
            fields.insert(column.clone(), value);
        }

        records.push(Record::from_fields(fields));
    }

    Ok(records)
}

/// Only the message column of a table, in row order
pub fn read_messages(path: &Path) -> Result<Vec<String>, PersistenceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let message_index = reader
        .headers()?
        .iter()
        .position(|h| h == Record::MESSAGE_FIELD)
        .ok_or_else(|| PersistenceError::MissingMessageColumn(path.to_path_buf()))?;

    let mut messages = Vec::new();
    for row in reader.records() {
        let row = row?;
        messages.push(row.get(message_index).unwrap_or_default().to_string());
    }
    Ok(messages)
}
