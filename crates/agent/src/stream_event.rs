//! Events emitted by the agent while it works.
//!
//! One `run` produces a finite sequence: iteration and generation
//! brackets, streamed thinking and response text, tool lifecycle events,
//! and exactly one terminal `Complete` or `Error` (unless the caller
//! stops listening first).

use sqlclaw_core::message::MessageToolCall;
use sqlclaw_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Why a run completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The model answered in plain text without calling a tool.
    Response,
    /// The submission tool accepted a query.
    AnswerSubmitted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new iteration began (1-based).
    IterationStart { iteration: u32 },

    /// A generation request is about to be sent.
    GenerationStart,

    ThinkingStart,

    ThinkingChunk { chunk: String },

    ThinkingEnd,

    /// Partial response text.
    ResponseChunk { chunk: String },

    /// The generation finished streaming.
    GenerationEnd {
        full_response: String,
        tool_calls: Vec<MessageToolCall>,
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },

    /// The model requested `count` tool calls.
    ToolCallStart { count: usize },

    ToolCallParsed {
        name: String,
        arguments: serde_json::Value,
    },

    ToolExecutionStart { name: String },

    ToolExecutionEnd { name: String, result: String },

    IterationEnd { iteration: u32 },

    /// The run finished. `response` is set for plain-text completions and
    /// `tool` for submissions.
    Complete {
        reason: CompletionReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        usage: Usage,
    },

    /// The run failed.
    Error { error: String, usage: Usage },
}

impl AgentEvent {
    /// Stable name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IterationStart { .. } => "iteration_start",
            Self::GenerationStart => "generation_start",
            Self::ThinkingStart => "thinking_start",
            Self::ThinkingChunk { .. } => "thinking_chunk",
            Self::ThinkingEnd => "thinking_end",
            Self::ResponseChunk { .. } => "response_chunk",
            Self::GenerationEnd { .. } => "generation_end",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallParsed { .. } => "tool_call_parsed",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
            Self::IterationEnd { .. } => "iteration_end",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
