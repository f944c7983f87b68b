//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are how the agent explores a database: list schemas, describe
//! tables, run exploratory SQL, read business-rules guides, and finally
//! submit an answer.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// Name of the tool that ends a run by submitting the final query.
pub const SUBMIT_TOOL_NAME: &str = "submit_answer";

/// Marks a tool result as a submitted answer; the query follows verbatim.
pub const ANSWER_SUBMITTED_PREFIX: &str = "ANSWER_SUBMITTED:";

/// A request to execute a tool, with its arguments decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value (an empty object when decoding failed)
    pub arguments: serde_json::Value,

    /// Set when the raw arguments were not a valid JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl ToolCall {
    /// Decode the raw argument string of a streamed tool call.
    ///
    /// Never fails: malformed JSON is recorded in `parse_error`.
    /// Empty arguments decode to `{}`.
    pub fn parse(call: &MessageToolCall) -> Self {
        let raw = call.arguments.trim();
        let (arguments, parse_error) = if raw.is_empty() {
            (serde_json::json!({}), None)
        } else {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value @ serde_json::Value::Object(_)) => (value, None),
                Ok(other) => (
                    serde_json::json!({}),
                    Some(format!("Invalid JSON arguments: expected an object, got {other}")),
                ),
                Err(e) => (serde_json::json!({}), Some(format!("Invalid JSON arguments: {e}"))),
            }
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
            parse_error,
        }
    }

    /// Read a string argument, if present.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content shown to the model
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// A handled failure whose message is still meant for the model.
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the ToolRegistry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "run_sql", "submit_answer").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
///
/// Definitions are reported in registration order.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool call by name.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(text))
        }
    }

    fn raw(args: &str) -> MessageToolCall {
        MessageToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: args.into(),
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.contains("echo"));
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn parse_valid_arguments() {
        let call = ToolCall::parse(&raw(r#"{"text": "hi"}"#));
        assert!(call.parse_error.is_none());
        assert_eq!(call.str_arg("text"), Some("hi"));
    }

    #[test]
    fn parse_empty_arguments_as_object() {
        let call = ToolCall::parse(&raw("  "));
        assert!(call.parse_error.is_none());
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn parse_malformed_arguments_records_error() {
        let call = ToolCall::parse(&raw(r#"{"text": "#));
        let err = call.parse_error.unwrap();
        assert!(err.starts_with("Invalid JSON arguments:"));
    }

    #[test]
    fn parse_non_object_arguments_records_error() {
        let call = ToolCall::parse(&raw("[1, 2]"));
        assert!(call.parse_error.is_some());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall::parse(&raw(r#"{"text": "hello world"}"#));
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let mut call = ToolCall::parse(&raw("{}"));
        call.name = "nonexistent".into();
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
