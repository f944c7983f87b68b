//! Tool-result truncation and deduplication.

use std::collections::HashMap;

use sqlclaw_config::CompressionConfig;
use sqlclaw_core::message::{Message, Role, find_originating_call};

/// Replaces the content of a repeated identical tool result.
pub const DUPLICATE_PLACEHOLDER: &str = "[Duplicate call - see earlier result]";

const TRUNCATED_MARKER: &str = "[Truncated] ";

/// When and how hard to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub enabled: bool,
    /// Most recent tool results kept in full.
    pub keep_recent: usize,
    /// Length older tool results are cut down to.
    pub max_chars: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_recent: 3,
            max_chars: 150,
        }
    }
}

impl From<&CompressionConfig> for CompressionSettings {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            enabled: config.enabled,
            keep_recent: config.keep_recent,
            max_chars: config.max_chars,
        }
    }
}

impl CompressionSettings {
    /// The messages to send: compressed when enabled, otherwise a copy.
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if self.enabled {
            compress(messages, self.keep_recent, self.max_chars)
        } else {
            messages.to_vec()
        }
    }
}

/// Shorten a tool result to roughly `max_chars` characters.
///
/// The first line usually summarises the result (row and column counts),
/// so it is kept alone when it fits. Lengths are in characters.
pub fn truncate_tool_result(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let first_line = content.split('\n').next().unwrap_or_default();
    if first_line.chars().count() <= max_chars.saturating_sub(20) {
        return format!("{TRUNCATED_MARKER}{first_line}");
    }

    let head: String = content.chars().take(max_chars.saturating_sub(15)).collect();
    format!("{TRUNCATED_MARKER}{head}...")
}

/// Project `messages` into a smaller view for the model.
///
/// The result has the same length and order; only the content of tool
/// messages changes. A tool result identical to an earlier result of the
/// same call (tool name plus raw arguments) becomes [`DUPLICATE_PLACEHOLDER`],
/// even if recent. Other tool results outside the last `keep_recent` are
/// truncated.
pub fn compress(messages: &[Message], keep_recent: usize, max_chars: usize) -> Vec<Message> {
    let tool_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::Tool)
        .map(|(i, _)| i)
        .collect();
    let recent = &tool_indices[tool_indices.len().saturating_sub(keep_recent)..];

    let mut seen: HashMap<String, String> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());

    for (i, msg) in messages.iter().enumerate() {
        let content = match (&msg.role, msg.content.as_deref()) {
            (Role::Tool, Some(content)) if !content.is_empty() => content,
            _ => {
                out.push(msg.clone());
                continue;
            }
        };

        let key = find_originating_call(messages, i).map(|call| format!("{}:{}", call.name, call.arguments));
        if let Some(key) = key {
            if seen.get(&key).is_some_and(|prev| prev == content) {
                out.push(with_content(msg, DUPLICATE_PLACEHOLDER.to_string()));
                continue;
            }
            seen.insert(key, content.to_string());
        }

        if recent.contains(&i) {
            out.push(msg.clone());
        } else {
            out.push(with_content(msg, truncate_tool_result(content, max_chars)));
        }
    }

    out
}

fn with_content(msg: &Message, content: String) -> Message {
    let mut copy = msg.clone();
    copy.content = Some(content);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlclaw_core::message::MessageToolCall;

    fn call(id: &str, name: &str, args: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args.into(),
        }
    }

    fn long_result(first_line: &str) -> String {
        format!("{first_line}\n{}", "a,b,c\n".repeat(60))
    }

    /// system, user, then one assistant+tool pair per (name, args, result).
    fn conversation(turns: &[(&str, &str, String)]) -> Vec<Message> {
        let mut messages = vec![Message::system("sys"), Message::user("question")];
        for (i, (name, args, result)) in turns.iter().enumerate() {
            let id = format!("call_{i}");
            messages.push(Message::assistant_with_tools("", vec![call(&id, name, args)]));
            messages.push(Message::tool_result(id, result.clone()));
        }
        messages
    }

    #[test]
    fn truncate_keeps_short_content() {
        assert_eq!(truncate_tool_result("short", 150), "short");
    }

    #[test]
    fn truncate_prefers_first_line() {
        let content = long_result("Query returned 60 row(s) and 3 column(s).");
        assert_eq!(
            truncate_tool_result(&content, 150),
            "[Truncated] Query returned 60 row(s) and 3 column(s)."
        );
    }

    #[test]
    fn truncate_long_first_line_by_chars() {
        let content = "é".repeat(200);
        let out = truncate_tool_result(&content, 50);
        assert_eq!(out, format!("[Truncated] {}...", "é".repeat(35)));
    }

    #[test]
    fn preserves_length_roles_and_ids() {
        let messages = conversation(&[
            ("run_sql", r#"{"query":"a"}"#, long_result("first")),
            ("run_sql", r#"{"query":"b"}"#, long_result("second")),
        ]);
        let out = compress(&messages, 1, 150);
        assert_eq!(out.len(), messages.len());
        for (a, b) in messages.iter().zip(&out) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.tool_call_id, b.tool_call_id);
            assert_eq!(a.tool_calls, b.tool_calls);
        }
    }

    #[test]
    fn old_results_truncated_recent_kept() {
        let messages = conversation(&[
            ("run_sql", r#"{"query":"a"}"#, long_result("first")),
            ("run_sql", r#"{"query":"b"}"#, long_result("second")),
            ("run_sql", r#"{"query":"c"}"#, long_result("third")),
        ]);
        let out = compress(&messages, 2, 150);
        assert_eq!(out[3].text(), "[Truncated] first");
        assert_eq!(out[5].text(), messages[5].text());
        assert_eq!(out[7].text(), messages[7].text());
    }

    #[test]
    fn zero_keep_recent_truncates_all() {
        let messages = conversation(&[("run_sql", "{}", long_result("only"))]);
        let out = compress(&messages, 0, 150);
        assert_eq!(out[3].text(), "[Truncated] only");
    }

    #[test]
    fn duplicates_replaced_even_when_recent() {
        let messages = conversation(&[
            ("list_schemas", "{}", "airline: flights".to_string()),
            ("list_schemas", "{}", "airline: flights".to_string()),
        ]);
        let out = compress(&messages, 3, 150);
        assert_eq!(out[3].text(), "airline: flights");
        assert_eq!(out[5].text(), DUPLICATE_PLACEHOLDER);
    }

    #[test]
    fn same_call_different_result_is_not_duplicate() {
        let messages = conversation(&[
            ("run_sql", r#"{"query":"a"}"#, "1".to_string()),
            ("run_sql", r#"{"query":"a"}"#, "2".to_string()),
            ("run_sql", r#"{"query":"a"}"#, "2".to_string()),
        ]);
        let out = compress(&messages, 3, 150);
        assert_eq!(out[3].text(), "1");
        assert_eq!(out[5].text(), "2");
        assert_eq!(out[7].text(), DUPLICATE_PLACEHOLDER);
    }

    #[test]
    fn different_arguments_are_not_duplicates() {
        let messages = conversation(&[
            ("run_sql", r#"{"query":"a"}"#, "same".to_string()),
            ("run_sql", r#"{"query":"b"}"#, "same".to_string()),
        ]);
        let out = compress(&messages, 3, 150);
        assert_eq!(out[5].text(), "same");
    }

    #[test]
    fn non_tool_messages_untouched() {
        let mut messages = conversation(&[]);
        messages.push(Message::assistant("x".repeat(500)));
        let out = compress(&messages, 0, 150);
        assert_eq!(out[2].text(), messages[2].text());
    }

    #[test]
    fn settings_disabled_is_identity() {
        let messages = conversation(&[("run_sql", "{}", long_result("only"))]);
        let out = CompressionSettings::default().apply(&messages);
        assert_eq!(out[3].text(), messages[3].text());
    }

    #[test]
    fn truncation_count_matches_non_exempt_long_results() {
        let messages = conversation(&[
            ("a", "{}", long_result("one")),
            ("b", "{}", "short".to_string()),
            ("c", "{}", long_result("three")),
            ("c", "{}", long_result("three")),
            ("d", "{}", long_result("five")),
        ]);
        let out = compress(&messages, 1, 150);
        let truncated = out.iter().filter(|m| m.text().starts_with("[Truncated] ")).count();
        // "one" and the first "three"; the second "three" is a duplicate, "five" is recent
        assert_eq!(truncated, 2);
        assert_eq!(out[9].text(), DUPLICATE_PLACEHOLDER);
    }
}
