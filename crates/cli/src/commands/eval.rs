//! `sqlclaw eval`: Grade the agent against gold queries.

use std::path::Path;
use std::sync::Arc;

use sqlclaw_config::AppConfig;
use sqlclaw_database::QueryResult;
use sqlclaw_eval::{EvalResult, EvalSummary, FailureType, evaluate, load_cases};

use super::{AgentKit, preview};

/// Rows shown per result set when a comparison fails.
const MISMATCH_ROWS: usize = 10;

pub async fn run(
    config: AppConfig,
    cases_path: &Path,
    concurrency: Option<usize>,
    max_cases: Option<usize>,
) -> anyhow::Result<()> {
    let mut cases = load_cases(cases_path)?;
    if let Some(max) = max_cases {
        cases.truncate(max);
    }
    let concurrency = concurrency.unwrap_or(config.eval.concurrency).max(1);
    let epsilon = config.eval.epsilon;

    let kit = Arc::new(AgentKit::load(config).await?);
    println!(
        "Evaluating {} case(s) from {} with concurrency {concurrency}\n",
        cases.len(),
        cases_path.display()
    );

    let results = evaluate(cases, kit.clone(), kit.engine(), concurrency, epsilon).await;
    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }
    println!("\n{}", EvalSummary::from_results(&results));
    Ok(())
}

fn head(result: &QueryResult) -> String {
    let shown = QueryResult::new(
        result.columns.clone(),
        result.rows.iter().take(MISMATCH_ROWS).cloned().collect(),
    );
    let mut table = shown.to_table();
    if result.row_count() > MISMATCH_ROWS {
        table.push_str(&format!("\n... ({} rows total)", result.row_count()));
    }
    table
}

fn print_result(number: usize, result: &EvalResult) {
    let status = if result.passed { "PASS" } else { "FAIL" };
    println!("[{number}] {status} {}", preview(&result.case.prompt, 70));
    if let Some(error) = &result.error {
        println!("      {:?}: {error}", result.failure_type);
    }
    if result.failure_type == FailureType::Mismatch {
        if let Some(query) = &result.submitted_query {
            println!("      submitted: {}", query.replace('\n', " "));
        }
        if let (Some(gold), Some(submitted)) = (&result.gold, &result.submitted) {
            println!("      gold rows:\n{}", head(gold));
            println!("      submitted rows:\n{}", head(submitted));
        }
    }
}
