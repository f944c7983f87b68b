//! The tools the SQL agent works with.
//!
//! Exploration tools (`run_sql`, `list_schemas`, `describe_table`,
//! `search_column`) read the database; `get_business_rules` pulls the
//! matching guide; `check_sql` asks the verifier for an early review;
//! `generate_sql` hands SQL writing to a dedicated model; `submit_answer`
//! ends the run with the final query.

pub mod business_rules;
pub mod check_sql;
pub mod generate_sql;
pub mod run_sql;
pub mod schema;
pub mod search_column;
pub mod submit_answer;

use std::sync::Arc;

use sqlclaw_agent::Verifier;
use sqlclaw_core::tool::ToolRegistry;
use sqlclaw_database::SqlEngine;
use sqlclaw_guides::GuideRetriever;

pub use business_rules::BusinessRulesTool;
pub use check_sql::CheckSqlTool;
pub use generate_sql::GenerateSqlTool;
pub use run_sql::RunSqlTool;
pub use schema::{DescribeTableTool, ListSchemasTool};
pub use search_column::SearchColumnTool;
pub use submit_answer::SubmitAnswerTool;

/// Build the agent's tool registry over one database and guide set.
///
/// Without a verifier, `check_sql` is still offered but only tells the
/// model to go ahead; `generate_sql` likewise without a generator.
pub fn sql_registry(
    engine: Arc<dyn SqlEngine>,
    retriever: Arc<GuideRetriever>,
    verifier: Option<Arc<dyn Verifier>>,
    generator: Option<GenerateSqlTool>,
    max_rows: usize,
    max_output_chars: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SubmitAnswerTool));
    registry.register(Box::new(
        RunSqlTool::new(engine.clone()).with_limits(max_rows, max_output_chars),
    ));
    registry.register(Box::new(ListSchemasTool::new(engine.clone())));
    registry.register(Box::new(DescribeTableTool::new(engine.clone())));
    registry.register(Box::new(SearchColumnTool::new(engine)));
    registry.register(Box::new(BusinessRulesTool::new(retriever)));
    registry.register(Box::new(match verifier {
        Some(v) => CheckSqlTool::new(v),
        None => CheckSqlTool::unconfigured(),
    }));
    registry.register(Box::new(generator.unwrap_or_else(GenerateSqlTool::unconfigured)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlclaw_agent::{RULES_TOOL_NAME, SCHEMA_TOOL_NAME};
    use sqlclaw_core::tool::{ANSWER_SUBMITTED_PREFIX, SUBMIT_TOOL_NAME, ToolResult};
    use sqlclaw_database::SqliteEngine;
    use sqlclaw_guides::GuideIndex;

    async fn registry(guides_dir: &std::path::Path) -> ToolRegistry {
        let engine = SqliteEngine::in_memory(
            &["airline"],
            &[
                "CREATE TABLE airline.flights (carrier TEXT, delay INTEGER)",
                "INSERT INTO airline.flights VALUES ('AA', 5), ('DL', 12)",
            ],
        )
        .await
        .unwrap();
        let index = GuideIndex::load_dir(guides_dir).unwrap();
        sql_registry(
            Arc::new(engine),
            Arc::new(GuideRetriever::new(index)),
            None,
            None,
            200,
            16_000,
        )
    }

    async fn run(registry: &ToolRegistry, name: &str, args: serde_json::Value) -> ToolResult {
        registry.get(name).unwrap().execute(args).await.unwrap()
    }

    #[tokio::test]
    async fn registers_tools_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path()).await;
        assert_eq!(
            registry.names(),
            vec![
                SUBMIT_TOOL_NAME,
                "run_sql",
                "list_schemas",
                SCHEMA_TOOL_NAME,
                "search_column",
                RULES_TOOL_NAME,
                "check_sql",
                "generate_sql",
            ]
        );
        assert_eq!(registry.definitions().len(), 8);
    }

    #[tokio::test]
    async fn tools_share_one_database() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("flights.md"),
            "# Flight Operations (Airline DB)\n## Delays\nCount delays over 10 minutes.\n",
        )
        .unwrap();
        let registry = registry(dir.path()).await;

        let rules = run(&registry, RULES_TOOL_NAME, serde_json::json!({"search_term": "airline"}))
            .await;
        assert!(rules.output.contains("Count delays over 10 minutes."));

        let rows = run(
            &registry,
            "run_sql",
            serde_json::json!({"query": "SELECT carrier FROM airline.flights WHERE delay > 10"}),
        )
        .await;
        assert!(rows.output.ends_with("carrier\nDL"));

        let submitted = run(&registry, SUBMIT_TOOL_NAME, serde_json::json!({"query": "SELECT 1"}))
            .await;
        assert_eq!(submitted.output, format!("{ANSWER_SUBMITTED_PREFIX}SELECT 1"));
    }
}
