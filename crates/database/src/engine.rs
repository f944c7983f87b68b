//! The engine seam every database tool talks through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlclaw_core::error::DatabaseError;

use crate::result::QueryResult;

/// One column of a table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl std::fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data_type = if self.data_type.is_empty() { "ANY" } else { &self.data_type };
        if self.nullable {
            write!(f, "{} ({}, nullable)", self.name, data_type)
        } else {
            write!(f, "{} ({})", self.name, data_type)
        }
    }
}

/// A read-only SQL database organised as schemas of tables.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Execute one query and collect every row.
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError>;

    /// Schema names, sorted.
    async fn list_schemas(&self) -> Result<Vec<String>, DatabaseError>;

    /// Table names in a schema, sorted.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, DatabaseError>;

    /// Columns of a table in declaration order.
    async fn describe_table(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError>;
}

/// A column found by [`search_columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
    /// 3 = exact name, 2 = prefix, 1 = substring
    pub rank: u8,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Find columns whose name contains `keyword` (case-insensitive).
///
/// Optional schema and table filters are case-insensitive substring
/// matches. Results are ordered by rank, then schema, table and column,
/// and capped at `limit`.
pub async fn search_columns(
    engine: &dyn SqlEngine,
    keyword: &str,
    schema_filter: Option<&str>,
    table_filter: Option<&str>,
    limit: usize,
) -> Result<Vec<ColumnMatch>, DatabaseError> {
    let keyword_lc = keyword.to_lowercase();
    let mut matches = Vec::new();

    for schema in engine.list_schemas().await? {
        if schema_filter.is_some_and(|f| !contains_ci(&schema, f)) {
            continue;
        }
        for table in engine.list_tables(&schema).await? {
            if table_filter.is_some_and(|f| !contains_ci(&table, f)) {
                continue;
            }
            for col in engine.describe_table(&schema, &table).await? {
                let name_lc = col.name.to_lowercase();
                let rank = if name_lc == keyword_lc {
                    3
                } else if name_lc.starts_with(&keyword_lc) {
                    2
                } else if name_lc.contains(&keyword_lc) {
                    1
                } else {
                    continue;
                };
                matches.push(ColumnMatch {
                    schema: schema.clone(),
                    table: table.clone(),
                    column: col.name,
                    data_type: col.data_type,
                    rank,
                });
            }
        }
    }

    matches.sort_by(|a, b| {
        b.rank
            .cmp(&a.rank)
            .then_with(|| a.schema.cmp(&b.schema))
            .then_with(|| a.table.cmp(&b.table))
            .then_with(|| a.column.cmp(&b.column))
    });
    matches.truncate(limit);
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_info_display() {
        let col = ColumnInfo {
            name: "ArrDelay".into(),
            data_type: "REAL".into(),
            nullable: true,
        };
        assert_eq!(col.to_string(), "ArrDelay (REAL, nullable)");

        let untyped = ColumnInfo {
            name: "x".into(),
            data_type: String::new(),
            nullable: false,
        };
        assert_eq!(untyped.to_string(), "x (ANY)");
    }
}
