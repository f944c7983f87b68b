//! Delegate SQL writing to a dedicated text-to-SQL model.

use std::sync::Arc;

use async_trait::async_trait;
use regex_lite::Regex;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::message::Message;
use sqlclaw_core::provider::{Provider, ProviderRequest};
use sqlclaw_core::tool::{Tool, ToolResult};
use tracing::{debug, warn};

const SQL_FENCE: &str = r"(?is)```(?:sql)?\s*\n(.*?)```";

const SYSTEM_PROMPT: &str = "\
You are a SQLite SQL expert. Generate a single SQL query that answers the \
user's question. Use schema-qualified table names (schema.table). Return ONLY \
the SQL query, with no explanation and no markdown fences.

RULES, YOU MUST FOLLOW ALL OF THESE:

1. BUSINESS RULES APPLICATION: When business rules are provided, translate \
EVERY applicable rule into SQL:
   - Exclusion rules -> WHERE filters (e.g. WHERE status NOT IN ('X'))
   - Classification mappings -> CASE WHEN col = 'A' THEN 'Label' END
   - Completed-only rules -> WHERE completed_col IS NOT NULL
   - External-factor exclusions -> WHERE factor_col IS NULL OR factor_col = 0
   - Threshold rules -> use the exact column and threshold from the rules
   - Date-cutoff rules -> WHERE date_col >= 'YYYY-01-01'
   - Min-threshold on aggregates -> HAVING SUM/COUNT >= N
   - Subtraction rules -> SUM(CASE WHEN type='refund' THEN -amt ELSE amt END)

2. COLUMN NAMES: Use ONLY exact column names from the schema. Never guess. If \
similar-sounding columns exist, choose the one that matches the rule's intent.

3. NUMERIC PRECISION:
   - Do NOT add ROUND() unless the question says 'round to N places'
   - Return fractions (0.0 to 1.0) unless the question says 'percentage'
   - Use CAST(x AS REAL) or x * 1.0 for float division when needed

4. FILTERS:
   - Do NOT add WHERE col IS NOT NULL unless explicitly required
   - Do NOT add extra filters beyond what the question and rules say

5. OUTPUT:
   - Keep name fields as separate columns (do not concatenate)
   - Include ALL columns the question asks for
   - Add ORDER BY only when the question implies ranking/top-N
   - Use HAVING for aggregate thresholds, WHERE for row-level
";

/// Pull the query out of a model reply: the first fenced block if there is
/// one, otherwise the whole trimmed reply.
pub fn extract_sql(reply: &str) -> String {
    let reply = reply.trim();
    Regex::new(SQL_FENCE)
        .ok()
        .and_then(|fence| {
            fence
                .captures(reply)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .unwrap_or_else(|| reply.to_string())
}

/// The user turn sent to the text-to-SQL model.
pub fn generation_prompt(
    question: &str,
    schema_info: &str,
    business_rules: &str,
    previous_sql: &str,
    error_message: &str,
) -> String {
    let mut parts = vec![format!("Question: {question}")];
    if !schema_info.is_empty() {
        parts.push(format!("\nSchema:\n{schema_info}"));
    }
    if !business_rules.is_empty() {
        parts.push(format!("\nBusiness rules (MUST apply):\n{business_rules}"));
    }
    if !previous_sql.is_empty() && !error_message.is_empty() {
        parts.push(format!(
            "\nPrevious attempt failed:\nSQL: {previous_sql}\nError: {error_message}\n\
             Fix the SQL and return the corrected query."
        ));
    }
    parts.join("\n")
}

pub struct GenerateSqlTool {
    generator: Option<(Arc<dyn Provider>, String)>,
}

impl GenerateSqlTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            generator: Some((provider, model.into())),
        }
    }

    /// A tool that tells the model to write its own SQL.
    pub fn unconfigured() -> Self {
        Self { generator: None }
    }
}

#[async_trait]
impl Tool for GenerateSqlTool {
    fn name(&self) -> &str {
        "generate_sql"
    }

    fn description(&self) -> &str {
        "Generate a SQL query for the user's question using a specialized NL2SQL model. Call this \
         when you need to write SQL: pass the question, schema info (from describe_table), and \
         business rules (from get_business_rules). Use the returned SQL in run_sql to test, then \
         submit_answer when correct. For retries after errors, pass previous_sql and error_message."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The user's natural language question."
                },
                "schema_info": {
                    "type": "string",
                    "description": "Relevant schema (tables, columns) from list_schemas and \
                        describe_table. Paste the key parts.",
                    "default": ""
                },
                "business_rules": {
                    "type": "string",
                    "description": "Relevant business rules from get_business_rules. Paste the \
                        full or summarized rules.",
                    "default": ""
                },
                "previous_sql": {
                    "type": "string",
                    "description": "Previous SQL that failed (for retries).",
                    "default": ""
                },
                "error_message": {
                    "type": "string",
                    "description": "Error from run_sql (for retries).",
                    "default": ""
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let Some((provider, model)) = &self.generator else {
            return Ok(ToolResult::ok(
                "generate_sql is not configured (no nl2sql model). Use run_sql with your own SQL instead.",
            ));
        };

        let question = arguments["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;
        let field = |key: &str| arguments[key].as_str().unwrap_or_default();

        let request = ProviderRequest::new(
            model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(generation_prompt(
                    question,
                    field("schema_info"),
                    field("business_rules"),
                    field("previous_sql"),
                    field("error_message"),
                )),
            ],
        )
        .with_temperature(0.2);

        match provider.complete(request).await {
            Ok(response) => {
                let sql = extract_sql(response.message.text());
                debug!(model = %model, chars = sql.len(), "Generated SQL");
                if sql.is_empty() {
                    Ok(ToolResult::error("Model returned empty SQL."))
                } else {
                    Ok(ToolResult::ok(sql))
                }
            }
            Err(e) => {
                warn!(model = %model, error = %e, "generate_sql failed");
                Ok(ToolResult::error(format!("Error generating SQL: {e}")))
            }
        }
    }
}
