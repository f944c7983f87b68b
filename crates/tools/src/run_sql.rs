//! Run exploratory SQL and show the result as CSV.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::{DatabaseError, ToolError};
use sqlclaw_core::tool::{Tool, ToolResult};
use sqlclaw_database::{QueryResult, SqlEngine};
use tracing::debug;

/// Rows shown when the model does not ask for a number.
pub const DEFAULT_ROWS_TO_DISPLAY: usize = 100;
/// Hard cap on displayed rows.
pub const MAX_ROWS: usize = 200;
/// Hard cap on output length, in characters.
pub const MAX_OUTPUT_CHARS: usize = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Truncation {
    RowLimit,
    OutputLimit,
}

impl Truncation {
    fn reason(self) -> &'static str {
        match self {
            Self::RowLimit => "row limit",
            Self::OutputLimit => "output limit",
        }
    }
}

pub struct RunSqlTool {
    engine: Arc<dyn SqlEngine>,
    max_rows: usize,
    max_output_chars: usize,
}

impl RunSqlTool {
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self {
            engine,
            max_rows: MAX_ROWS,
            max_output_chars: MAX_OUTPUT_CHARS,
        }
    }

    pub fn with_limits(mut self, max_rows: usize, max_output_chars: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self.max_output_chars = max_output_chars;
        self
    }
}

fn render(result: &QueryResult, rows_to_show: usize, truncation: Option<Truncation>) -> String {
    let mut header = format!(
        "Query returned {} row(s) and {} column(s).",
        result.row_count(),
        result.column_count()
    );
    if let Some(truncation) = truncation {
        header.push_str(&format!(
            " Showing first {rows_to_show} rows (truncated due to {}).",
            truncation.reason()
        ));
    }
    format!("{header}\n\n{}", result.to_csv(rows_to_show))
}

/// Render `result`, showing at most `rows_to_display` rows and shrinking
/// further (by binary search on the row count) to fit `max_chars`.
fn format_result(result: &QueryResult, rows_to_display: usize, max_chars: usize) -> String {
    if result.is_empty() {
        return format!(
            "Query executed successfully but returned no data.\nColumns ({}): {}",
            result.column_count(),
            result.columns.join(", ")
        );
    }

    let mut rows_to_show = result.row_count().min(rows_to_display);
    let row_truncation = (rows_to_show < result.row_count()).then_some(Truncation::RowLimit);
    let output = render(result, rows_to_show, row_truncation);
    if output.chars().count() <= max_chars || rows_to_show <= 1 {
        return output;
    }

    let fits = |n: usize| render(result, n, Some(Truncation::OutputLimit)).chars().count() <= max_chars;
    let (mut low, mut high) = (1, rows_to_show);
    while low < high {
        let mid = (low + high + 1) / 2;
        if fits(mid) {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    rows_to_show = low;
    debug!(rows_to_show, total = result.row_count(), "Shrunk run_sql output");
    render(result, rows_to_show, Some(Truncation::OutputLimit))
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        "run_sql"
    }

    fn description(&self) -> &str {
        "Execute a SQL query against a database. The database dialect is SQLite. You might want to \
         inspect the database first to see what schemas are available. Similarly, you might want to \
         look at the fields for a given table in a schema. Use schema.table syntax in your queries \
         (e.g., SELECT * FROM financial.account). Always use full precision unless explicitly stated \
         otherwise."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A SQL query to execute. Use schema.table syntax for table names \
                        (e.g., 'SELECT * FROM financial.account WHERE ...')."
                },
                "rows_to_display": {
                    "type": "integer",
                    "description": "The maximum number of rows to display in the result. Defaults \
                        to 100. Increase if you need to see more (max 200).",
                    "default": DEFAULT_ROWS_TO_DISPLAY
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let rows_to_display = arguments["rows_to_display"]
            .as_u64()
            .map_or(DEFAULT_ROWS_TO_DISPLAY, |n| n as usize)
            .clamp(1, self.max_rows);

        match self.engine.execute(query).await {
            Ok(result) => Ok(ToolResult::ok(format_result(
                &result,
                rows_to_display,
                self.max_output_chars,
            ))),
            Err(DatabaseError::Query(reason)) => {
                Ok(ToolResult::error(format!("Query execution failed: {reason}")))
            }
            Err(e) => Ok(ToolResult::error(format!("Query execution failed: {e}"))),
        }
    }
}
