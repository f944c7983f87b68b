//! Tool dispatch, with a verification gate in front of the submission tool.
//!
//! Dispatch never fails: every problem becomes text the model can read and
//! react to on its next turn.

use std::sync::Arc;

use sqlclaw_config::VerifierConfig;
use sqlclaw_core::message::{Conversation, Role};
use sqlclaw_core::tool::{ANSWER_SUBMITTED_PREFIX, SUBMIT_TOOL_NAME, ToolCall, ToolRegistry};
use tracing::{debug, info, warn};

use crate::verifier::Verifier;

/// Tool whose results are gathered as business rules for the verifier.
pub const RULES_TOOL_NAME: &str = "get_business_rules";
/// Tool whose results are gathered as schema information for the verifier.
pub const SCHEMA_TOOL_NAME: &str = "describe_table";

/// The result of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Any result that does not end the run.
    Ongoing(String),
    /// The submission tool accepted a final query.
    Submitted { query: String, raw: String },
}

impl ToolOutcome {
    /// Tag a raw tool result by its submission prefix.
    pub fn from_result(output: String) -> Self {
        let query = output.strip_prefix(ANSWER_SUBMITTED_PREFIX).map(str::to_string);
        match query {
            Some(query) => Self::Submitted { query, raw: output },
            None => Self::Ongoing(output),
        }
    }

    /// The text recorded in the conversation.
    pub fn text(&self) -> &str {
        match self {
            Self::Ongoing(text) => text,
            Self::Submitted { raw, .. } => raw,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

/// Holds back submissions the verifier rejects, a bounded number of times
/// per run.
pub struct VerificationGate {
    verifier: Arc<dyn Verifier>,
    max_rejections: u32,
    rejections: u32,
    prompt: String,
    rules_budget: usize,
    schema_budget: usize,
}

impl VerificationGate {
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        let defaults = VerifierConfig::default();
        Self {
            verifier,
            max_rejections: defaults.max_rejections,
            rejections: 0,
            prompt: String::new(),
            rules_budget: defaults.rules_budget,
            schema_budget: defaults.schema_budget,
        }
    }

    pub fn from_config(verifier: Arc<dyn Verifier>, config: &VerifierConfig) -> Self {
        Self::new(verifier)
            .with_max_rejections(config.max_rejections)
            .with_budgets(config.rules_budget, config.schema_budget)
    }

    pub fn with_max_rejections(mut self, max: u32) -> Self {
        self.max_rejections = max;
        self
    }

    pub fn with_budgets(mut self, rules: usize, schema: usize) -> Self {
        self.rules_budget = rules;
        self.schema_budget = schema;
        self
    }

    /// Start a new run for `prompt`.
    pub fn reset(&mut self, prompt: &str) {
        self.rejections = 0;
        self.prompt = prompt.to_string();
    }

    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    /// Verify a submission. Returns the rejection text when it is held back.
    pub async fn check(&mut self, call: &ToolCall, conversation: &Conversation) -> Option<String> {
        if call.name != SUBMIT_TOOL_NAME || self.rejections >= self.max_rejections {
            return None;
        }

        let sql = call.str_arg("query").unwrap_or_default();
        let (rules, schema) = self.gather_context(conversation);
        debug!(
            rules_chars = rules.len(),
            schema_chars = schema.len(),
            "Verifying submission"
        );

        let result = self.verifier.verify(&self.prompt, sql, &rules, &schema).await;
        if result.passed {
            return None;
        }

        self.rejections += 1;
        info!(
            rejection = self.rejections,
            max = self.max_rejections,
            "Verifier rejected submission"
        );
        Some(format!(
            "[Verification {}/{}] Your query was NOT submitted. The verifier found issues:\n\n{}\n\n\
             Fix these issues and call submit_answer again.",
            self.rejections, self.max_rejections, result.feedback
        ))
    }

    /// Most recent rules and schema tool results, newest first.
    fn gather_context(&self, conversation: &Conversation) -> (String, String) {
        let mut rules = Collected::new(self.rules_budget);
        let mut schema = Collected::new(self.schema_budget);

        for (i, msg) in conversation.messages.iter().enumerate().rev() {
            if msg.role != Role::Tool || msg.text().is_empty() {
                continue;
            }
            match conversation.originating_call(i).map(|c| c.name.as_str()) {
                Some(RULES_TOOL_NAME) => rules.add(msg.text()),
                Some(SCHEMA_TOOL_NAME) => schema.add(msg.text()),
                _ => {}
            }
        }

        (rules.finish(), schema.finish())
    }
}

/// Tool results joined by blank lines until a character budget is reached.
struct Collected {
    parts: Vec<String>,
    chars: usize,
    budget: usize,
}

impl Collected {
    fn new(budget: usize) -> Self {
        Self {
            parts: Vec::new(),
            chars: 0,
            budget,
        }
    }

    fn add(&mut self, text: &str) {
        if self.chars < self.budget {
            self.chars += text.chars().count();
            self.parts.push(text.to_string());
        }
    }

    fn finish(self) -> String {
        self.parts.join("\n\n").chars().take(self.budget).collect()
    }
}

/// Runs tool calls against a registry.
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    gate: Option<VerificationGate>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools, gate: None }
    }

    pub fn with_gate(mut self, gate: VerificationGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn gate(&self) -> Option<&VerificationGate> {
        self.gate.as_ref()
    }

    /// Reset per-run gate state.
    pub fn begin_run(&mut self, prompt: &str) {
        if let Some(gate) = self.gate.as_mut() {
            gate.reset(prompt);
        }
    }

    /// Execute one call. Never fails.
    pub async fn execute(&mut self, call: &ToolCall, conversation: &Conversation) -> ToolOutcome {
        if let Some(err) = &call.parse_error {
            return ToolOutcome::Ongoing(format!("Error parsing arguments for tool '{}': {err}", call.name));
        }
        if !self.tools.contains(&call.name) {
            warn!(tool = %call.name, "Unknown tool requested");
            return ToolOutcome::Ongoing(format!("Error: Unknown tool '{}'", call.name));
        }

        if let Some(gate) = self.gate.as_mut()
            && let Some(rejection) = gate.check(call, conversation).await
        {
            return ToolOutcome::Ongoing(rejection);
        }

        match self.tools.execute(call).await {
            Ok(result) => {
                if !result.success {
                    debug!(tool = %call.name, "Tool reported failure");
                }
                ToolOutcome::from_result(result.output)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolOutcome::Ongoing(format!("Error executing {}: {e}", call.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifierResult;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlclaw_core::error::{ProviderError, ToolError};
    use sqlclaw_core::message::{Message, MessageToolCall};
    use sqlclaw_core::tool::{Tool, ToolResult};
    use std::sync::Mutex;

    struct Submit;

    #[async_trait]
    impl Tool for Submit {
        fn name(&self) -> &str {
            SUBMIT_TOOL_NAME
        }
        fn description(&self) -> &str {
            "submit"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
            let query = args["query"].as_str().unwrap_or_default();
            Ok(ToolResult::ok(format!("{ANSWER_SUBMITTED_PREFIX}{query}")))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "disk on fire".into(),
            })
        }
    }

    /// Replays verdicts in order and records what it was shown.
    struct QueuedVerifier {
        verdicts: Mutex<Vec<Result<VerifierResult, ProviderError>>>,
        seen: Mutex<Vec<(String, String, String, String)>>,
    }

    impl QueuedVerifier {
        fn new(mut verdicts: Vec<Result<VerifierResult, ProviderError>>) -> Arc<Self> {
            verdicts.reverse();
            Arc::new(Self {
                verdicts: Mutex::new(verdicts),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Verifier for QueuedVerifier {
        async fn try_verify(
            &self,
            question: &str,
            sql: &str,
            rules: &str,
            schema: &str,
        ) -> Result<VerifierResult, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((question.into(), sql.into(), rules.into(), schema.into()));
            self.verdicts.lock().unwrap().pop().unwrap_or(Ok(VerifierResult::pass()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Submit));
        registry.register(Box::new(Broken));
        Arc::new(registry)
    }

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall::parse(&MessageToolCall {
            id: "c1".into(),
            name: name.into(),
            arguments: args.into(),
        })
    }

    fn submit(sql: &str) -> ToolCall {
        call(SUBMIT_TOOL_NAME, &json!({ "query": sql }).to_string())
    }

    fn push_tool_turn(conversation: &mut Conversation, id: &str, name: &str, result: &str) {
        conversation.push(Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: id.into(),
                name: name.into(),
                arguments: "{}".into(),
            }],
        ));
        conversation.push(Message::tool_result(id, result));
    }

    #[test]
    fn outcome_tags_submission_prefix() {
        let outcome = ToolOutcome::from_result("ANSWER_SUBMITTED:SELECT 1".into());
        assert_eq!(
            outcome,
            ToolOutcome::Submitted {
                query: "SELECT 1".into(),
                raw: "ANSWER_SUBMITTED:SELECT 1".into()
            }
        );
        assert_eq!(outcome.text(), "ANSWER_SUBMITTED:SELECT 1");
        assert!(!ToolOutcome::from_result("rows: 3".into()).is_submitted());
    }

    #[tokio::test]
    async fn errors_become_text() {
        let mut dispatcher = ToolDispatcher::new(registry());
        let conversation = Conversation::with_system("sys");

        let out = dispatcher.execute(&call("run_sql", "{not json"), &conversation).await;
        assert!(out.text().starts_with("Error parsing arguments for tool 'run_sql': "));

        let out = dispatcher.execute(&call("drop_table", "{}"), &conversation).await;
        assert_eq!(out.text(), "Error: Unknown tool 'drop_table'");

        let out = dispatcher.execute(&call("broken", "{}"), &conversation).await;
        assert_eq!(
            out.text(),
            "Error executing broken: Tool execution failed: broken: disk on fire"
        );
    }

    #[tokio::test]
    async fn submission_without_gate() {
        let mut dispatcher = ToolDispatcher::new(registry());
        let out = dispatcher
            .execute(&submit("SELECT 1"), &Conversation::with_system("sys"))
            .await;
        assert!(out.is_submitted());
    }

    #[tokio::test]
    async fn gate_rejects_once_then_lets_through() {
        let verifier = QueuedVerifier::new(vec![
            Ok(VerifierResult::fail("missing filter")),
            Ok(VerifierResult::fail("still wrong")),
        ]);
        let mut dispatcher = ToolDispatcher::new(registry()).with_gate(VerificationGate::new(verifier.clone()));
        dispatcher.begin_run("How many flights?");
        let conversation = Conversation::with_system("sys");

        let first = dispatcher.execute(&submit("SELECT 1"), &conversation).await;
        assert_eq!(
            first.text(),
            "[Verification 1/1] Your query was NOT submitted. The verifier found issues:\n\n\
             missing filter\n\nFix these issues and call submit_answer again."
        );

        // Budget spent: the second submission goes straight through
        let second = dispatcher.execute(&submit("SELECT 2"), &conversation).await;
        assert_eq!(second.text(), "ANSWER_SUBMITTED:SELECT 2");
        assert_eq!(verifier.seen.lock().unwrap().len(), 1);

        // A new run restores the budget
        dispatcher.begin_run("Next question");
        let third = dispatcher.execute(&submit("SELECT 3"), &conversation).await;
        assert!(!third.is_submitted());
        assert_eq!(verifier.seen.lock().unwrap()[1].0, "Next question");
    }

    #[tokio::test]
    async fn gate_passes_and_fails_open() {
        let verifier = QueuedVerifier::new(vec![
            Ok(VerifierResult::pass()),
            Err(ProviderError::Network("judge offline".into())),
        ]);
        let mut dispatcher = ToolDispatcher::new(registry()).with_gate(VerificationGate::new(verifier));
        dispatcher.begin_run("q");
        let conversation = Conversation::with_system("sys");

        assert!(dispatcher.execute(&submit("SELECT 1"), &conversation).await.is_submitted());
        assert!(dispatcher.execute(&submit("SELECT 1"), &conversation).await.is_submitted());
        assert_eq!(dispatcher.gate().map(|g| g.rejections()), Some(0));
    }

    #[tokio::test]
    async fn gate_ignores_other_tools() {
        let verifier = QueuedVerifier::new(vec![Ok(VerifierResult::fail("no"))]);
        let mut dispatcher = ToolDispatcher::new(registry()).with_gate(VerificationGate::new(verifier.clone()));
        dispatcher.execute(&call("broken", "{}"), &Conversation::with_system("s")).await;
        assert!(verifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn gate_gathers_newest_context_within_budget() {
        let verifier = QueuedVerifier::new(vec![]);
        let gate = VerificationGate::new(verifier.clone()).with_budgets(100, 5);
        let mut dispatcher = ToolDispatcher::new(registry()).with_gate(gate);
        dispatcher.begin_run("q");

        let mut conversation = Conversation::with_system("sys");
        conversation.push(Message::user("q"));
        push_tool_turn(&mut conversation, "a", RULES_TOOL_NAME, "old rules");
        push_tool_turn(&mut conversation, "b", SCHEMA_TOOL_NAME, "Table: airline.flights");
        push_tool_turn(&mut conversation, "c", "run_sql", "Query returned 1 row(s)");
        push_tool_turn(&mut conversation, "d", RULES_TOOL_NAME, "new rules");

        dispatcher.execute(&submit("SELECT 1"), &conversation).await;

        let seen = verifier.seen.lock().unwrap();
        let (question, sql, rules, schema) = &seen[0];
        assert_eq!(question, "q");
        assert_eq!(sql, "SELECT 1");
        assert_eq!(rules, "new rules\n\nold rules");
        assert_eq!(schema, "Table");
    }
}
