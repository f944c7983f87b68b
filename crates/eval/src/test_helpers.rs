//! A provider that answers from the prompt itself, plus a small database.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_agent::Agent;
use sqlclaw_core::error::ProviderError;
use sqlclaw_core::message::{Message, MessageToolCall, Role};
use sqlclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use sqlclaw_core::tool::{SUBMIT_TOOL_NAME, ToolRegistry};
use sqlclaw_database::{SqlEngine, SqliteEngine};
use sqlclaw_tools::SubmitAnswerTool;
use tokio::sync::mpsc;

/// Prompts starting with `SQL: ` are submitted verbatim, `FAIL` makes the
/// stream fail, anything else gets a plain-text reply.
pub struct PromptedProvider;

pub fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

#[async_trait]
impl Provider for PromptedProvider {
    fn name(&self) -> &str {
        "prompted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant("unused"),
            usage: None,
            model: "prompted".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text().to_string())
            .unwrap_or_default();

        if prompt.starts_with("FAIL") {
            return Err(ProviderError::Network("connection reset".into()));
        }
        let chunk = match prompt.strip_prefix("SQL: ") {
            Some(sql) => StreamChunk {
                tool_calls: vec![MessageToolCall {
                    id: "call_1".into(),
                    name: SUBMIT_TOOL_NAME.into(),
                    arguments: serde_json::json!({ "query": sql }).to_string(),
                }],
                finish_reason: Some("tool_calls".into()),
                done: true,
                usage: Some(usage()),
                ..Default::default()
            },
            None => StreamChunk {
                content: Some("I cannot answer that.".into()),
                finish_reason: Some("stop".into()),
                done: true,
                usage: Some(usage()),
                ..Default::default()
            },
        };
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Ok(chunk));
        Ok(rx)
    }
}

pub fn agent() -> Agent {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SubmitAnswerTool));
    Agent::new(Arc::new(PromptedProvider), "test-model", Arc::new(registry))
}

pub async fn engine() -> Arc<dyn SqlEngine> {
    Arc::new(
        SqliteEngine::in_memory(
            &["airline"],
            &[
                "CREATE TABLE airline.flights (carrier TEXT, delay REAL)",
                "INSERT INTO airline.flights VALUES ('AA', 5.0), ('DL', 12.5), ('UA', 30.25)",
            ],
        )
        .await
        .unwrap(),
    )
}
