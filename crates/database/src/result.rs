//! Tabular query results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single SQL value, after SQLite's dynamic typing has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Real(r) => write!(f, "{r}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Column names plus rows of values, in result order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(index))
    }

    /// Render a header line plus the first `limit` rows as CSV.
    ///
    /// NULL renders as an empty field; fields containing commas, quotes
    /// or line breaks are quoted.
    pub fn to_csv(&self, limit: usize) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, self.columns.iter().map(String::as_str));
        for row in self.rows.iter().take(limit) {
            let cells: Vec<String> = row
                .iter()
                .map(|c| match c {
                    CellValue::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            push_csv_line(&mut out, cells.iter().map(String::as_str));
        }
        // No trailing newline
        out.pop();
        out
    }

    /// Render as a pipe-separated table (used for sample rows).
    pub fn to_table(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(self.columns.join(" | "));
        lines.push(
            self.columns
                .iter()
                .map(|c| "-".repeat(c.chars().count().max(8)))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &self.rows {
            lines.push(row.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | "));
        }
        lines.join("\n")
    }
}

fn push_csv_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}
