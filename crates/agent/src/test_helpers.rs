//! Shared test helpers: a provider that replays scripted turns.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlclaw_core::error::ProviderError;
use sqlclaw_core::message::{Message, MessageToolCall};
use sqlclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use tokio::sync::mpsc;

/// One scripted streaming turn.
pub type Turn = Result<Vec<Result<StreamChunk, ProviderError>>, ProviderError>;

/// A provider that returns scripted stream turns and completions in order.
///
/// Once the stream script runs out, the optional fallback turn repeats;
/// without one, `stream` reports an error. Every request is recorded.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    fallback: Option<Vec<StreamChunk>>,
    completions: Mutex<VecDeque<String>>,
    stream_requests: Mutex<Vec<ProviderRequest>>,
    completion_requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            fallback: None,
            completions: Mutex::new(VecDeque::new()),
            stream_requests: Mutex::new(Vec::new()),
            completion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a streaming turn.
    pub fn with_turn(self, chunks: Vec<StreamChunk>) -> Self {
        self.turns.lock().unwrap().push_back(Ok(chunks.into_iter().map(Ok).collect()));
        self
    }

    /// Queue a turn whose stream fails to start.
    pub fn with_failed_turn(self, error: ProviderError) -> Self {
        self.turns.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue a turn that yields `chunks` and then an error.
    pub fn with_interrupted_turn(self, chunks: Vec<StreamChunk>, error: ProviderError) -> Self {
        let mut items: Vec<Result<StreamChunk, ProviderError>> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.turns.lock().unwrap().push_back(Ok(items));
        self
    }

    /// Repeat this turn once the script is exhausted.
    pub fn with_fallback(mut self, chunks: Vec<StreamChunk>) -> Self {
        self.fallback = Some(chunks);
        self
    }

    /// Queue a non-streaming completion.
    pub fn with_completion(self, text: &str) -> Self {
        self.completions.lock().unwrap().push_back(text.to_string());
        self
    }

    pub fn stream_requests(&self) -> Vec<ProviderRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub fn completion_requests(&self) -> Vec<ProviderRequest> {
        self.completion_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.completion_requests.lock().unwrap().push(request);
        let text = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Network("no scripted completion".into()))?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(usage()),
            model: "scripted".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.stream_requests.lock().unwrap().push(request);
        let next = self.turns.lock().unwrap().pop_front();
        let items = match (next, &self.fallback) {
            (Some(turn), _) => turn?,
            (None, Some(fallback)) => fallback.iter().cloned().map(Ok).collect(),
            (None, None) => return Err(ProviderError::NotConfigured("stream script exhausted".into())),
        };

        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            let _ = tx.try_send(item);
        }
        Ok(rx)
    }
}

/// Usage reported by every scripted turn.
pub fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

fn final_chunk(finish_reason: &str, tool_calls: Vec<MessageToolCall>) -> StreamChunk {
    StreamChunk {
        tool_calls,
        finish_reason: Some(finish_reason.into()),
        done: true,
        usage: Some(usage()),
        ..Default::default()
    }
}

/// A turn that streams `text` in two pieces and stops.
pub fn text_turn(text: &str) -> Vec<StreamChunk> {
    let mid = text.char_indices().nth(text.chars().count() / 2).map_or(text.len(), |(i, _)| i);
    let (head, tail) = text.split_at(mid);
    let mut chunks: Vec<StreamChunk> = [head, tail]
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(StreamChunk::content)
        .collect();
    chunks.push(final_chunk("stop", Vec::new()));
    chunks
}

/// A turn that requests the given tool calls.
pub fn tool_turn(calls: Vec<MessageToolCall>) -> Vec<StreamChunk> {
    vec![final_chunk("tool_calls", calls)]
}

/// A turn that thinks before answering with `text`.
pub fn thinking_turn(thought: &str, text: &str) -> Vec<StreamChunk> {
    let mut chunks = vec![StreamChunk::reasoning(thought), StreamChunk::reasoning(" more")];
    chunks.extend(text_turn(text));
    chunks
}

/// A tool call with JSON arguments.
pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}
