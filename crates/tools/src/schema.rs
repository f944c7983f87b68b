//! Catalog browsing: schemas, tables, and columns with sample rows.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::tool::{Tool, ToolResult};
use sqlclaw_database::SqlEngine;
use tracing::debug;

/// Rows of sample data shown by `describe_table`.
const SAMPLE_ROWS: usize = 3;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct ListSchemasTool {
    engine: Arc<dyn SqlEngine>,
}

impl ListSchemasTool {
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListSchemasTool {
    fn name(&self) -> &str {
        "list_schemas"
    }

    fn description(&self) -> &str {
        "List all available database schemas and their tables. Call this to discover which schemas \
         and tables exist in the database. No parameters required."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let schemas = self.engine.list_schemas().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        if schemas.is_empty() {
            return Ok(ToolResult::ok("No schemas found in the database."));
        }

        let mut lines = vec![format!("Available schemas ({} total):", schemas.len()), String::new()];
        for schema in &schemas {
            let tables = self.engine.list_tables(schema).await.unwrap_or_default();
            if tables.is_empty() {
                lines.push(format!("  {schema}: (no tables)"));
            } else {
                lines.push(format!("  {schema}: {}", tables.join(", ")));
            }
        }
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

pub struct DescribeTableTool {
    engine: Arc<dyn SqlEngine>,
}

impl DescribeTableTool {
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    fn name(&self) -> &str {
        "describe_table"
    }

    fn description(&self) -> &str {
        "Get detailed column information and sample data for a specific table. Use this to \
         understand table structure before writing queries."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "schema_name": {
                    "type": "string",
                    "description": "The schema name (e.g., 'Airline', 'Credit', 'financial')."
                },
                "table_name": {
                    "type": "string",
                    "description": "The table name within the schema."
                }
            },
            "required": ["schema_name", "table_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let schema = arguments["schema_name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'schema_name' argument".into()))?;
        let table = arguments["table_name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'table_name' argument".into()))?;

        let columns = match self.engine.describe_table(schema, table).await {
            Ok(columns) if !columns.is_empty() => columns,
            Ok(_) => Vec::new(),
            Err(e) => {
                debug!(schema, table, error = %e, "describe_table lookup failed");
                Vec::new()
            }
        };
        if columns.is_empty() {
            return Ok(ToolResult::error(format!(
                "Table '{schema}.{table}' not found or has no columns."
            )));
        }

        let mut lines = vec![
            format!("Table: {schema}.{table}"),
            format!("Columns ({}):", columns.len()),
        ];
        lines.extend(columns.iter().map(|c| format!("  - {c}")));

        let sample_sql = format!(
            "SELECT * FROM {}.{} LIMIT {SAMPLE_ROWS}",
            quote_ident(schema),
            quote_ident(table)
        );
        if let Ok(sample) = self.engine.execute(&sample_sql).await
            && !sample.is_empty()
        {
            lines.push(String::new());
            lines.push(format!("Sample data ({SAMPLE_ROWS} rows):"));
            lines.push(sample.to_table());
        }

        Ok(ToolResult::ok(lines.join("\n")))
    }
}
