//! Find columns by keyword across the whole catalog.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::tool::{Tool, ToolResult};
use sqlclaw_database::{ColumnMatch, SqlEngine, search_columns};

/// Most matches shown in one answer.
pub const MAX_RESULTS: usize = 40;

pub struct SearchColumnTool {
    engine: Arc<dyn SqlEngine>,
}

impl SearchColumnTool {
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self { engine }
    }
}

fn format_matches(keyword: &str, matches: &[ColumnMatch], schema: &str, table: &str) -> String {
    let plural = if matches.len() == 1 { "" } else { "s" };
    let mut lines = vec![
        format!("Columns matching '{keyword}' ({} result{plural}):", matches.len()),
        String::new(),
        format!("{:<22} {:<40} {:<35} {:<20} Rank", "Schema", "Table", "Column", "Type"),
        "-".repeat(130),
    ];
    for m in matches {
        lines.push(format!(
            "{:<22} {:<40} {:<35} {:<20} {}",
            m.schema, m.table, m.column, m.data_type, m.rank
        ));
    }

    if matches.len() == MAX_RESULTS {
        lines.push(format!(
            "\n(Results capped at {MAX_RESULTS}. Use a more specific keyword.)"
        ));
    }
    if !schema.is_empty() || !table.is_empty() {
        let or_any = |s: &str| if s.is_empty() { "*".to_string() } else { s.to_string() };
        lines.push(format!(
            "\nApplied filters: schema='{}', table='{}'",
            or_any(schema),
            or_any(table)
        ));
    }
    lines.push("\nTo see sample values, call describe_table(schema_name, table_name).".into());
    lines.join("\n")
}

#[async_trait]
impl Tool for SearchColumnTool {
    fn name(&self) -> &str {
        "search_column"
    }

    fn description(&self) -> &str {
        "Search for columns by keyword across ALL schemas and tables in the database. Use this when \
         you know a concept (e.g. 'delay', 'carrier', 'status', 'amount') but need to find the exact \
         column name and which table it lives in. Results are ranked by relevance: exact > prefix > \
         substring. Optional schema/table filters help narrow results. Returns schema, table, column \
         name, and data type for every match. Follow up with describe_table to see sample values."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "A word or partial word to search for in column names. \
                        Examples: 'delay', 'carrier', 'status', 'amount', 'date'."
                },
                "schema_name": {
                    "type": "string",
                    "description": "Optional schema filter (case-insensitive contains match). \
                        Example: 'Airline', 'financial'.",
                    "default": ""
                },
                "table_name": {
                    "type": "string",
                    "description": "Optional table filter (case-insensitive contains match). \
                        Example: 'On_Time', 'charge'.",
                    "default": ""
                }
            },
            "required": ["keyword"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let keyword = arguments["keyword"].as_str().unwrap_or_default().trim();
        if keyword.is_empty() {
            return Ok(ToolResult::error("Please provide a non-empty keyword."));
        }
        let schema = arguments["schema_name"].as_str().unwrap_or_default().trim();
        let table = arguments["table_name"].as_str().unwrap_or_default().trim();

        let matches = search_columns(
            self.engine.as_ref(),
            keyword,
            (!schema.is_empty()).then_some(schema),
            (!table.is_empty()).then_some(table),
            MAX_RESULTS,
        )
        .await;

        match matches {
            Err(e) => Ok(ToolResult::error(format!("Search failed: {e}"))),
            Ok(found) if found.is_empty() => Ok(ToolResult::ok(format!(
                "No columns found matching '{keyword}'. Try a shorter or different keyword."
            ))),
            Ok(found) => Ok(ToolResult::ok(format_matches(keyword, &found, schema, table))),
        }
    }
}
