//! Wire types for the lab backend.
//!
//! Defines the tabular query result and the payloads of the schema,
//! dashboard, seed, and listing endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Represents the result of executing a SQL statement on the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names, in order. Names may repeat.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Rows of data, each keyed by column name.
    #[serde(default)]
    pub rows: Vec<Row>,

    /// Number of rows as reported by the backend (0 if absent).
    #[serde(default, deserialize_with = "lenient_count")]
    pub row_count: u64,

    /// Server-measured execution time in whole milliseconds (0 if absent).
    #[serde(default, deserialize_with = "lenient_count")]
    pub elapsed_ms: u64,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            columns,
            rows,
            row_count,
            elapsed_ms: 0,
        }
    }

    /// Builds a result from a page of JSON records.
    ///
    /// Columns follow the key order of the first record; keys that only
    /// appear in later records are appended.
    pub fn from_records(records: &[serde_json::Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let Some(object) = record.as_object() else {
                continue;
            };
            let mut row = Row::new();
            for (key, value) in object {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
                row.insert(key.clone(), Value::from_json(value));
            }
            rows.push(row);
        }

        Self::with_data(columns, rows)
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value of `column` in the given row, `Null` if missing.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }
}

/// Accepts a missing, null, integer, or fractional count and truncates it.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(match value {
        Some(v) if v.is_finite() && v > 0.0 => v as u64,
        _ => 0,
    })
}

/// A row of data, keyed by column name.
pub type Row = HashMap<String, Value>;

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string form, `None` for NULL.
    ///
    /// Numbers and booleans are formatted without locale rules.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
        }
    }

    /// Display form for result grids.
    pub fn to_display_string(&self) -> String {
        self.as_text().unwrap_or_else(|| "NULL".to_string())
    }

    /// Converts an arbitrary JSON value; nested values are kept as JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// A column as reported by the schema listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,

    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub nullable: Option<bool>,

    /// SQLite reports the key position as an integer; anything non-zero is a key.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub primary_key: bool,

    #[serde(default)]
    pub default: Option<String>,
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Table name → ordered columns.
pub type TableCatalog = BTreeMap<String, Vec<ColumnSchema>>;

/// Aggregate statistics for the dashboard view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub kpis: Kpis,
    #[serde(default)]
    pub top_emisores: Vec<NamedAmount>,
}

/// Headline indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    #[serde(default)]
    pub total_docs: u64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub vigentes: u64,
}

/// One bar of the top-issuers chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedAmount {
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

/// Acknowledgement returned by the seed endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Size of the synthetic dataset to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedScale {
    #[default]
    Small,
    Medium,
    Large,
}

impl SeedScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl FromStr for SeedScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(format!(
                "Invalid seed scale: {s}. Expected: small, medium, or large"
            )),
        }
    }
}

impl fmt::Display for SeedScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for the paged document listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComprobanteQuery {
    pub skip: u32,
    pub limit: u32,
    /// Substring matched against UUID or folio.
    pub q: Option<String>,
}

impl Default for ComprobanteQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            q: None,
        }
    }
}

impl ComprobanteQuery {
    /// Returns the query string pairs for this listing.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("skip".to_string(), self.skip.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("q".to_string(), q.to_string()));
        }
        pairs
    }
}
