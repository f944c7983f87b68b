//! Graded results and their summary.

use serde::{Deserialize, Serialize};
use sqlclaw_core::provider::Usage;
use sqlclaw_database::QueryResult;

use crate::case::EvalCase;

/// Why a case did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Passed.
    None,
    /// Submitted an answer whose rows differ from the gold rows.
    Mismatch,
    /// Finished without calling `submit_answer`.
    NoSubmission,
    /// The run ended in an error event.
    AgentError,
    /// The submitted query failed to execute.
    SqlError,
    /// The gold query failed, or returned nothing to compare against.
    InfraError,
    /// The evaluation task itself died.
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub case: EvalCase,
    pub submitted_query: Option<String>,
    pub passed: bool,
    pub error: Option<String>,
    pub failure_type: FailureType,
    /// Both result sets, kept on mismatch for inspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<QueryResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<QueryResult>,
    pub usage: Usage,
}

impl EvalResult {
    pub fn passed(case: EvalCase, query: String, usage: Usage) -> Self {
        Self {
            case,
            submitted_query: Some(query),
            passed: true,
            error: None,
            failure_type: FailureType::None,
            gold: None,
            submitted: None,
            usage,
        }
    }

    pub fn failed(
        case: EvalCase,
        submitted_query: Option<String>,
        failure_type: FailureType,
        error: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            case,
            submitted_query,
            passed: false,
            error: Some(error.into()),
            failure_type,
            gold: None,
            submitted: None,
            usage,
        }
    }
}

/// Totals over a batch of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    /// Wrong answers.
    pub mismatched: usize,
    /// Every other failure.
    pub other_failures: usize,
    pub usage: Usage,
}

impl EvalSummary {
    pub fn from_results(results: &[EvalResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let mismatched = results
            .iter()
            .filter(|r| r.failure_type == FailureType::Mismatch)
            .count();
        Self {
            total: results.len(),
            passed,
            mismatched,
            other_failures: results.len() - passed - mismatched,
            usage: results.iter().map(|r| r.usage).sum(),
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    /// Fraction passed; zero for an empty batch.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

impl std::fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Passed {}/{} ({:.1}%), mismatched {}, other failures {}, tokens {} (prompt {}, completion {})",
            self.passed,
            self.total,
            self.pass_rate() * 100.0,
            self.mismatched,
            self.other_failures,
            self.usage.total_tokens,
            self.usage.prompt_tokens,
            self.usage.completion_tokens,
        )
    }
}
