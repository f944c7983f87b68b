//! Business-rules lookup through the guide retriever.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_agent::RULES_TOOL_NAME;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::tool::{Tool, ToolResult};
use sqlclaw_guides::GuideRetriever;

pub struct BusinessRulesTool {
    retriever: Arc<GuideRetriever>,
}

impl BusinessRulesTool {
    pub fn new(retriever: Arc<GuideRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for BusinessRulesTool {
    fn name(&self) -> &str {
        RULES_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Retrieve business rules for a specific domain or database schema. These rules define \
         critical filters, exclusions, calculations, and classifications that MUST be applied when \
         writing SQL queries. Search by schema name, domain keyword, or topic. ALWAYS call this tool \
         before writing any SQL query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "search_term": {
                    "type": "string",
                    "description": "A schema name, domain keyword, or topic to search for. Examples: \
                        schema name (e.g. 'Sales', 'Inventory'), domain (e.g. 'analytics', \
                        'reporting'), or topic (e.g. 'transactions', 'delays', 'classifications')."
                }
            },
            "required": ["search_term"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let term = arguments["search_term"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'search_term' argument".into()))?;
        Ok(ToolResult::ok(self.retriever.retrieve(term).await))
    }
}
