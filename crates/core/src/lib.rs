//! # sqlclaw Core
//!
//! Domain types, traits, and error definitions for the sqlclaw agent.
//! This crate has **no framework dependencies**: it defines the model that
//! the provider, tool, database, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (LLM [`Provider`], agent
//! [`Tool`]). Implementations live in their respective crates, which keeps
//! the agent loop testable against scripted providers and in-memory tools.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{DatabaseError, GuideError, ProviderError, ToolError};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    ChunkReceiver, EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    ReasoningDetail, StreamChunk, ToolDefinition, Usage,
};
pub use tool::{ANSWER_SUBMITTED_PREFIX, SUBMIT_TOOL_NAME, Tool, ToolCall, ToolRegistry, ToolResult};
