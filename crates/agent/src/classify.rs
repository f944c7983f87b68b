//! Classification of a generation that produced no tool calls.
//!
//! Some models write the arguments of the call they meant to make as plain
//! text. The loop treats those, and empty output, as recoverable.

use serde_json::{Map, Value};

/// Keys a model typically writes when it prints tool arguments as text.
pub const ARGUMENT_KEYS: &[&str] = &[
    "query",
    "question",
    "sql",
    "schema_name",
    "table_name",
    "search_term",
    "keyword",
    "business_rules",
    "schema_info",
    "previous_sql",
    "error_message",
];

/// What kind of text an assistant turn without tool calls contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    /// Blank or whitespace only.
    Empty,
    /// JSON that looks like a tool call written as text.
    MalformedToolCall,
    /// A genuine final response.
    NormalText,
}

/// Whether JSON-shaped text is treated as a failed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedOutputPolicy {
    #[default]
    Detect,
    /// Only empty output is recovered; everything else is a response.
    Off,
}

impl MalformedOutputPolicy {
    pub fn from_flag(detect: bool) -> Self {
        if detect { Self::Detect } else { Self::Off }
    }
}

/// Classify assistant text that came without tool calls.
pub fn classify_output(text: &str, tool_names: &[&str], policy: MalformedOutputPolicy) -> OutputClass {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return OutputClass::Empty;
    }
    if policy == MalformedOutputPolicy::Detect && looks_like_tool_call(trimmed, tool_names) {
        return OutputClass::MalformedToolCall;
    }
    OutputClass::NormalText
}

fn looks_like_tool_call(text: &str, tool_names: &[&str]) -> bool {
    let body = strip_fence(text);
    if !(body.starts_with('{') && body.ends_with('}')) {
        return false;
    }
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
        return false;
    };

    if !object.is_empty() && object.keys().all(|k| ARGUMENT_KEYS.contains(&k.as_str())) {
        return true;
    }
    names_registered_tool(&object, tool_names)
}

/// `{"name": ..., "arguments": ...}` or `{"tool": ..., "arguments": ...}`
/// naming a tool that exists.
fn names_registered_tool(object: &Map<String, Value>, tool_names: &[&str]) -> bool {
    if !object.contains_key("arguments") {
        return false;
    }
    ["name", "tool"].iter().any(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|name| tool_names.contains(&name))
    })
}

/// Drop the first and last line of a ``` fenced block.
fn strip_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let Some((_, rest)) = text.split_once('\n') else {
        return "";
    };
    let rest = rest.trim_end();
    match rest.rsplit_once('\n') {
        Some((body, last)) if last.trim_start().starts_with("```") => body.trim(),
        None if rest.starts_with("```") => "",
        _ => rest.trim(),
    }
}
