//! Delimited-text export of query results.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::api::{QueryResult, Value};
use crate::error::{LabError, Result};

const DELIMITER: char = ',';

/// Quoting rules for exported fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvDialect {
    /// Wraps fields containing the delimiter in quotes and leaves embedded
    /// quotes untouched. Matches the files produced by the web client.
    #[default]
    Compatible,
    /// RFC 4180 quoting: fields with delimiters, quotes, or line breaks are
    /// quoted and embedded quotes are doubled.
    Strict,
}

/// An exported result set, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl CsvArtifact {
    /// Returns the contents as text.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    /// Writes the artifact into `dir`, returning the full path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            LabError::io(format!("Failed to create {}: {e}", dir.display()))
        })?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)
            .map_err(|e| LabError::io(format!("Failed to write {}: {e}", path.display())))?;
        info!(bytes = self.bytes.len(), "Exported results to {}", path.display());
        Ok(path)
    }
}

/// Exports `result` with the default dialect, named after the current time.
///
/// Returns `None` for an empty result.
pub fn export(result: &QueryResult) -> Option<CsvArtifact> {
    export_with(result, CsvDialect::default(), unix_millis())
}

/// Exports `result` with an explicit dialect and timestamp.
pub fn export_with(result: &QueryResult, dialect: CsvDialect, millis: u128) -> Option<CsvArtifact> {
    if result.row_count == 0 || result.rows.is_empty() {
        return None;
    }
    Some(CsvArtifact {
        file_name: format!("results_{millis}.csv"),
        bytes: to_csv(result, dialect).into_bytes(),
    })
}

/// Serializes `result`: a header line, one line per row, no trailing newline.
pub fn to_csv(result: &QueryResult, dialect: CsvDialect) -> String {
    let separator = DELIMITER.to_string();
    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(result.columns.join(&separator));

    for row in &result.rows {
        let fields: Vec<String> = result
            .columns
            .iter()
            .map(|col| format_field(row.get(col).unwrap_or(&Value::Null), dialect))
            .collect();
        lines.push(fields.join(&separator));
    }

    lines.join("\n")
}

fn format_field(value: &Value, dialect: CsvDialect) -> String {
    let Some(text) = value.as_text() else {
        return String::new();
    };
    match dialect {
        CsvDialect::Compatible if text.contains(DELIMITER) => format!("\"{text}\""),
        CsvDialect::Strict
            if text.contains(DELIMITER) || text.contains('"') || text.contains(['\n', '\r']) =>
        {
            format!("\"{}\"", text.replace('"', "\"\""))
        }
        _ => text,
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
