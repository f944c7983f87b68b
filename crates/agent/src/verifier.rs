//! Second-opinion review of a candidate SQL query by a judge model.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::ProviderError;
use sqlclaw_core::message::Message;
use sqlclaw_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

/// Longest slice of rules or schema text sent to the judge.
pub const FIELD_LIMIT: usize = 4000;

const NONE_RETRIEVED: &str = "(none retrieved)";

const SYSTEM_PROMPT: &str = "\
You are a SQL query verifier for a SQLite database. Your job is to check \
whether a submitted SQL query will return the correct results for a given \
natural-language question, according to the provided business rules and \
schema information.

You will receive four inputs:
1. The original question
2. The business rules guide that applies to this domain
3. Schema information (column names, types, sample rows)
4. The submitted SQL query

Examine the query for the following error patterns:

## 1. BUSINESS RULES COMPLETENESS
Every applicable rule from the guide MUST appear in the SQL. For each rule \
ask: \"Does this rule apply to the question?\" If yes, verify it is \
implemented as a WHERE filter, HAVING clause, CASE expression, or JOIN \
condition. Commonly missed rules include:
- Exclusion rules (certain rows, statuses, or transaction types must be filtered out)
- Entities that must be reported separately or excluded entirely
- Classification mappings that should produce human-readable labels via \
CASE WHEN instead of returning raw codes
- Minimum-threshold or minimum-count requirements
- Date or period restrictions (legacy data cutoffs, era boundaries)

## 2. COLUMN CORRECTNESS
Every column name in the SQL must match a real column from the schema info. \
Watch for:
- Similarly-named columns with different semantics (e.g., one column is \
always non-negative while another can be negative; one is a code, another \
a full identifier)
- Using the wrong column for threshold checks or aggregation

## 3. TABLE SELECTION AND DOMAIN LOGIC
- Detail tables (individual records) are usually correct when filters must \
be applied. Summary or aggregate tables may lack the columns needed for \
filtering and should be avoided in those cases.
- Metrics should be calculated from raw data columns; using pre-computed \
columns can give wrong results when combined with WHERE filters.
- Domain concepts (e.g., \"completed\", \"on-time\", \"default\", \"rookie\") \
must match the definitions in the business rules, not general intuition.

## 4. OUTPUT FORMAT
- Does the SELECT list include ALL columns the question asks for?
- Are person names kept as separate columns (not concatenated)?
- When the question refers to a classification, does the query use \
CASE WHEN labels from the business rules, or raw codes?
- If the question implies a constant/literal label column (e.g., \"as a \
single 'Region X' entity\"), is it present?

## 5. NUMERIC PRECISION
- ROUND() only if the question explicitly says \"round to N places\".
- Rates/ratios as fractions (0-1) unless the question says \"percentage\".
- Integer division vs float division should match context expectations.

## 6. FILTER CORRECTNESS
- No extra WHERE filters that are not justified by the question or rules \
(e.g., unnecessary IS NOT NULL that removes valid data).
- HAVING for aggregated thresholds (career totals, lifetime sums) vs \
WHERE for per-row thresholds.
- No unnecessary table joins that could change the result count.

RESPOND WITH EXACTLY ONE OF:
- \"PASS\" if the query is correct
- \"FAIL:\" followed by each issue on its own line if there are problems. \
Be specific about what is wrong and what the correct fix should be.
";

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierResult {
    pub passed: bool,
    /// Empty when passed.
    pub feedback: String,
}

impl VerifierResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            feedback: String::new(),
        }
    }

    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            passed: false,
            feedback: feedback.into(),
        }
    }
}

/// Judges whether a query answers a question under the given rules.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// One judgement; transport failures are returned as errors.
    async fn try_verify(
        &self,
        question: &str,
        sql: &str,
        business_rules: &str,
        schema_info: &str,
    ) -> Result<VerifierResult, ProviderError>;

    /// Like [`Verifier::try_verify`], but a failed judge call counts as a pass.
    async fn verify(&self, question: &str, sql: &str, business_rules: &str, schema_info: &str) -> VerifierResult {
        match self.try_verify(question, sql, business_rules, schema_info).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Verifier call failed, treating as PASS");
                VerifierResult::pass()
            }
        }
    }
}

/// Interpret the judge's reply.
pub fn parse_verdict(response: &str) -> VerifierResult {
    let response = response.trim();
    if response.to_uppercase().starts_with("PASS") {
        return VerifierResult::pass();
    }
    let feedback = match response.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("fail:") => response[5..].trim(),
        _ => response,
    };
    VerifierResult::fail(feedback)
}

fn char_prefix(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn or_none(text: &str) -> &str {
    if text.is_empty() {
        NONE_RETRIEVED
    } else {
        char_prefix(text, FIELD_LIMIT)
    }
}

/// The user turn shown to the judge.
pub fn verifier_prompt(question: &str, sql: &str, business_rules: &str, schema_info: &str) -> String {
    format!(
        "## Original Question\n{question}\n\n\
         ## Business Rules Guide\n{}\n\n\
         ## Schema Information\n{}\n\n\
         ## Submitted SQL Query\n```sql\n{sql}\n```",
        or_none(business_rules),
        or_none(schema_info),
    )
}

/// A [`Verifier`] backed by a chat model, called without streaming.
pub struct LlmVerifier {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmVerifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Verifier for LlmVerifier {
    async fn try_verify(
        &self,
        question: &str,
        sql: &str,
        business_rules: &str,
        schema_info: &str,
    ) -> Result<VerifierResult, ProviderError> {
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(verifier_prompt(question, sql, business_rules, schema_info)),
            ],
        )
        .with_temperature(0.1);

        let response = self.provider.complete(request).await?;
        let result = parse_verdict(response.message.text());
        debug!(model = %self.model, passed = result.passed, "Verifier verdict");
        Ok(result)
    }
}
