//! Shape-agnostic tabular payload normalization.
//!
//! Data sources return results in several loosely-typed shapes. [`normalize`]
//! detects the shape and produces one canonical [`TabularPayload`] so that
//! charting and analysis never branch on the raw encoding.
//!
//! Accepted shapes (optionally wrapped one level under a `data` key):
//! - `{columns, rows}` with rows as ordered value sequences or as records
//! - `{columns, rows_compact}` with rows as ordered value sequences
//! - a bare sequence of key-value records (columns = union of keys)
//!
//! Anything else, or a result with zero rows, yields an explicitly empty
//! payload rather than an error.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Canonical row/column table.
///
/// Every row holds exactly one value per declared column, aligned by index.
/// Missing cells are [`Value::Null`], never omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularPayload {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularPayload {
    /// An explicitly empty table (no columns, no rows).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from columns and aligned rows.
    ///
    /// Rows shorter than `columns` are padded with null; longer rows are
    /// truncated. Returns an empty table when either side is empty.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        if columns.is_empty() || rows.is_empty() {
            return Self::empty();
        }
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Whether the table has no rows or no columns.
    ///
    /// Callers must check this before charting.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// Column names in stable order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table declares a column with this exact name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Position of a column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value at `(row, column)`, or `None` if either is out of range.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column in row order. Empty if the column is absent.
    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().filter_map(|r| r.get(idx)).collect(),
            None => Vec::new(),
        }
    }

    /// Whether every non-null value of the column is a JSON number and at
    /// least one value is non-null.
    pub fn is_numeric_column(&self, column: &str) -> bool {
        let values = self.column_values(column);
        let mut seen_number = false;
        for value in values {
            match value {
                Value::Null => {}
                Value::Number(_) => seen_number = true,
                _ => return false,
            }
        }
        seen_number
    }

    /// Numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.is_numeric_column(c))
            .map(String::as_str)
            .collect()
    }

    /// First column that is not numeric, in table order.
    pub fn first_non_numeric_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| !self.is_numeric_column(c))
            .map(String::as_str)
    }

    /// Number of distinct non-null values in a column.
    pub fn distinct_count(&self, column: &str) -> usize {
        self.column_values(column)
            .into_iter()
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .collect::<HashSet<_>>()
            .len()
    }

    /// A copy restricted to the first `n` rows, in table order.
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Rows as JSON records keyed by column name.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Normalize a raw result payload into a [`TabularPayload`].
///
/// Never fails: unrecognised shapes and zero-row results produce
/// [`TabularPayload::empty`].
pub fn normalize(raw: &Value) -> TabularPayload {
    let data = match raw {
        Value::Object(map) => match map.get("data") {
            Some(inner @ (Value::Object(_) | Value::Array(_))) => inner,
            _ => raw,
        },
        _ => raw,
    };

    match data {
        Value::Array(items) => from_records(&[], items),
        Value::Object(map) => from_object(map),
        _ => TabularPayload::empty(),
    }
}

/// Handle `{columns, rows}`, `{columns, rows_compact}` and `{rows: [records]}`.
fn from_object(map: &Map<String, Value>) -> TabularPayload {
    let columns = match map.get("columns") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => match string_list(value) {
            Some(columns) => columns,
            None => return TabularPayload::empty(),
        },
    };

    let rows = non_empty_array(map.get("rows"));
    let compact = non_empty_array(map.get("rows_compact"));

    if columns.is_empty() {
        return match rows {
            Some(records) if records.first().is_some_and(Value::is_object) => {
                from_records(&[], records)
            }
            _ => TabularPayload::empty(),
        };
    }

    if let Some(compact) = compact {
        return from_sequences(columns, compact);
    }

    match rows {
        Some(records) if records.first().is_some_and(Value::is_object) => {
            from_records(&columns, records)
        }
        Some(sequences) => from_sequences(columns, sequences),
        None => TabularPayload::empty(),
    }
}

/// Rows encoded as value sequences aligned to `columns`.
fn from_sequences(columns: Vec<String>, rows: &[Value]) -> TabularPayload {
    let mut aligned = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            Value::Array(values) => aligned.push(values.clone()),
            _ => return TabularPayload::empty(),
        }
    }
    TabularPayload::from_rows(columns, aligned)
}

/// Rows encoded as key-value records. Declared columns come first, then
/// undeclared keys in first-seen order.
fn from_records(declared: &[String], records: &[Value]) -> TabularPayload {
    let mut columns: Vec<String> = declared.to_vec();
    let mut known: HashSet<String> = columns.iter().cloned().collect();

    let mut objects = Vec::with_capacity(records.len());
    for record in records {
        let Value::Object(obj) = record else {
            return TabularPayload::empty();
        };
        for key in obj.keys() {
            if known.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .into_iter()
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    TabularPayload::from_rows(columns, rows)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect()
}

fn non_empty_array(value: Option<&Value>) -> Option<&[Value]> {
    match value {
        Some(Value::Array(items)) if !items.is_empty() => Some(items.as_slice()),
        _ => None,
    }
}
