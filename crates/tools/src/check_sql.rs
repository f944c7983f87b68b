//! On-demand review of a query by the verifier, before submitting it.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_agent::Verifier;
use sqlclaw_core::error::ToolError;
use sqlclaw_core::tool::{Tool, ToolResult};

pub struct CheckSqlTool {
    verifier: Option<Arc<dyn Verifier>>,
}

impl CheckSqlTool {
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }

    /// A tool that tells the model no reviewer is available.
    pub fn unconfigured() -> Self {
        Self { verifier: None }
    }
}

#[async_trait]
impl Tool for CheckSqlTool {
    fn name(&self) -> &str {
        "check_sql"
    }

    fn description(&self) -> &str {
        "Validate a SQL query before submitting it. Checks that all applicable business rules are \
         implemented, that column names are correct, that output format matches the question, and \
         that numeric precision is right. Call this after run_sql looks correct but before \
         submit_answer when you want a second opinion. Pass the question, your SQL, the \
         business_rules text from get_business_rules, and the schema_info from describe_table."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The original natural-language question."
                },
                "sql": {
                    "type": "string",
                    "description": "The SQL query to validate."
                },
                "business_rules": {
                    "type": "string",
                    "description": "Full business rules text from get_business_rules. Paste the \
                        entire returned content.",
                    "default": ""
                },
                "schema_info": {
                    "type": "string",
                    "description": "Column descriptions from describe_table calls. Paste the \
                        relevant parts.",
                    "default": ""
                }
            },
            "required": ["question", "sql"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let Some(verifier) = &self.verifier else {
            return Ok(ToolResult::ok(
                "check_sql is not configured. Proceed with submit_answer if you are confident in your query.",
            ));
        };

        let question = arguments["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;
        let sql = arguments["sql"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'sql' argument".into()))?;
        let rules = arguments["business_rules"].as_str().unwrap_or_default();
        let schema = arguments["schema_info"].as_str().unwrap_or_default();

        let result = verifier.verify(question, sql, rules, schema).await;
        if result.passed {
            Ok(ToolResult::ok(
                "LGTM — no issues found. You may call submit_answer with this query.",
            ))
        } else {
            Ok(ToolResult::ok(format!(
                "Issues found — fix these before submitting:\n\n{}",
                result.feedback
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlclaw_agent::VerifierResult;
    use sqlclaw_core::error::ProviderError;
    use std::sync::Mutex;

    struct Fixed {
        verdict: VerifierResult,
        seen: Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl Verifier for Fixed {
        async fn try_verify(
            &self,
            _question: &str,
            sql: &str,
            rules: &str,
            _schema: &str,
        ) -> Result<VerifierResult, ProviderError> {
            *self.seen.lock().unwrap() = Some((sql.into(), rules.into()));
            Ok(self.verdict.clone())
        }
    }

    fn args() -> serde_json::Value {
        serde_json::json!({"question": "How many?", "sql": "SELECT 1", "business_rules": "rule A"})
    }

    #[tokio::test]
    async fn pass_says_lgtm() {
        let verifier = Arc::new(Fixed {
            verdict: VerifierResult::pass(),
            seen: Mutex::new(None),
        });
        let result = CheckSqlTool::new(verifier.clone()).execute(args()).await.unwrap();
        assert!(result.output.starts_with("LGTM"));
        assert_eq!(
            verifier.seen.lock().unwrap().clone(),
            Some(("SELECT 1".to_string(), "rule A".to_string()))
        );
    }

    #[tokio::test]
    async fn fail_lists_issues() {
        let verifier = Arc::new(Fixed {
            verdict: VerifierResult::fail("- missing status filter"),
            seen: Mutex::new(None),
        });
        let result = CheckSqlTool::new(verifier).execute(args()).await.unwrap();
        assert_eq!(
            result.output,
            "Issues found — fix these before submitting:\n\n- missing status filter"
        );
    }

    #[tokio::test]
    async fn unconfigured_defers_to_model() {
        let result = CheckSqlTool::unconfigured().execute(serde_json::json!({})).await.unwrap();
        assert!(result.output.starts_with("check_sql is not configured."));
    }
}
