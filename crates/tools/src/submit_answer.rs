//! The tool that ends a run.

use async_trait::async_trait;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::tool::{ANSWER_SUBMITTED_PREFIX, SUBMIT_TOOL_NAME, Tool, ToolResult};

pub struct SubmitAnswerTool;

#[async_trait]
impl Tool for SubmitAnswerTool {
    fn name(&self) -> &str {
        SUBMIT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Submit your final SQL query as the answer to the current question. Use this tool when you \
         are confident that your query correctly answers the question. You should test your query \
         with run_sql first to verify it produces the expected results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The final SQL query to submit as your answer. Must be valid SQL \
                        syntax with table names qualified by schema names (e.g., 'SELECT * FROM schema.table')."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        Ok(ToolResult::ok(format!("{ANSWER_SUBMITTED_PREFIX}{query}")))
    }
}
