//! The agent reasoning loop.
//!
//! Each iteration streams one generation, then either dispatches the tool
//! calls it produced or decides whether plain text ends the run. The loop
//! reports everything it does as [`AgentEvent`]s on an unbounded channel.

use std::sync::Arc;

use sqlclaw_config::AppConfig;
use sqlclaw_core::error::ProviderError;
use sqlclaw_core::message::{Conversation, Message, MessageToolCall};
use sqlclaw_core::provider::{Provider, ProviderRequest, Usage};
use sqlclaw_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::{MalformedOutputPolicy, OutputClass, classify_output};
use crate::context::CompressionSettings;
use crate::dispatch::{ToolDispatcher, ToolOutcome, VerificationGate};
use crate::stream_event::{AgentEvent, CompletionReason};
use crate::verifier::Verifier;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous SQL agent. You must complete tasks \
independently without asking the user for clarification or additional information. Use the \
available tools to gather any information you need. If you're uncertain, make your best \
assumptions and proceed.

CRITICAL: You MUST call the 'submit_answer' tool to complete EVERY task. NEVER stop without \
calling submit_answer. Even if you've computed the answer, you MUST submit it via submit_answer \
with a valid SQL query.

Do not provide answers as plain text - always use the submit_answer tool with a valid SQL query \
that generates a dataframe with the intended answer.";

/// Injected after an empty or JSON-shaped reply.
pub const CORRECTIVE_MESSAGE: &str = "You must use the submit_answer TOOL to submit your answer - \
do not output JSON directly. Call the submit_answer tool now with your SQL query.";

pub const MAX_ITERATIONS_ERROR: &str = "Max iterations reached";

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Submitted { query: String, usage: Usage },
    Responded { response: String, usage: Usage },
    /// The iteration budget ran out.
    Exhausted { usage: Usage },
    /// The provider failed to stream.
    Failed { error: String, usage: Usage },
    /// The event receiver was dropped.
    Cancelled,
}

impl RunOutcome {
    pub fn submitted_query(&self) -> Option<&str> {
        match self {
            Self::Submitted { query, .. } => Some(query),
            _ => None,
        }
    }

    pub fn usage(&self) -> Usage {
        match self {
            Self::Submitted { usage, .. }
            | Self::Responded { usage, .. }
            | Self::Exhausted { usage }
            | Self::Failed { usage, .. } => *usage,
            Self::Cancelled => Usage::default(),
        }
    }
}

/// The receiver went away.
struct Cancelled;

struct Emitter {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl Emitter {
    fn emit(&self, event: AgentEvent) -> Result<(), Cancelled> {
        self.tx.send(event).map_err(|_| Cancelled)
    }

    /// Terminal events are best effort; the outcome stands either way.
    fn emit_final(&self, event: AgentEvent) {
        let _ = self.tx.send(event);
    }
}

/// What one streamed generation produced.
#[derive(Debug, Default)]
struct Generation {
    content: String,
    tool_calls: Vec<MessageToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

/// An SQL agent bound to one conversation.
pub struct Agent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    compression: CompressionSettings,
    malformed_policy: MalformedOutputPolicy,
    dispatcher: ToolDispatcher,
    system_prompt: String,
    conversation: Conversation,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 25,
            compression: CompressionSettings::default(),
            malformed_policy: MalformedOutputPolicy::default(),
            dispatcher: ToolDispatcher::new(tools),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            conversation: Conversation::with_system(DEFAULT_SYSTEM_PROMPT),
        }
    }

    /// Build an agent from application config. The verifier gate is only
    /// installed when enabled in config and a verifier is supplied.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        verifier: Option<Arc<dyn Verifier>>,
    ) -> Self {
        let mut agent = Self::new(provider, config.model.clone(), tools)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_compression(CompressionSettings::from(&config.compression))
            .with_malformed_policy(MalformedOutputPolicy::from_flag(
                config.agent.detect_malformed_tool_calls,
            ));
        if let Some(prompt) = &config.agent.system_prompt_override {
            agent = agent.with_system_prompt(prompt.clone());
        }
        if config.verifier.enabled
            && let Some(verifier) = verifier
        {
            agent = agent.with_gate(VerificationGate::from_config(verifier, &config.verifier));
        }
        agent
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_compression(mut self, compression: CompressionSettings) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedOutputPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    pub fn with_gate(mut self, gate: VerificationGate) -> Self {
        self.dispatcher = self.dispatcher.with_gate(gate);
        self
    }

    /// Replace the system prompt. Starts a fresh conversation.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self.reset();
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Forget everything but the system prompt.
    pub fn reset(&mut self) {
        self.conversation = Conversation::with_system(self.system_prompt.clone());
    }

    /// Run one prompt to completion, streaming events into `events`.
    ///
    /// The conversation carries over between runs. Dropping the receiver
    /// stops the run at its next event.
    pub async fn run(&mut self, prompt: &str, events: mpsc::UnboundedSender<AgentEvent>) -> RunOutcome {
        let emitter = Emitter { tx: events };
        match self.drive(prompt, &emitter).await {
            Ok(outcome) => outcome,
            Err(Cancelled) => {
                info!(conversation_id = %self.conversation.id, "Run cancelled by caller");
                RunOutcome::Cancelled
            }
        }
    }

    /// Run and collect every event.
    pub async fn run_collect(&mut self, prompt: &str) -> (Vec<AgentEvent>, RunOutcome) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = self.run(prompt, tx).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (events, outcome)
    }

    async fn drive(&mut self, prompt: &str, emitter: &Emitter) -> Result<RunOutcome, Cancelled> {
        self.conversation.push(Message::user(prompt));
        self.dispatcher.begin_run(prompt);
        let mut usage = Usage::default();

        info!(
            conversation_id = %self.conversation.id,
            model = %self.model,
            max_iterations = self.max_iterations,
            "Starting agent run"
        );

        for iteration in 1..=self.max_iterations {
            emitter.emit(AgentEvent::IterationStart { iteration })?;
            debug!(iteration, messages = self.conversation.len(), "Agent loop iteration");

            let generation = match self.generate(emitter).await? {
                Ok(generation) => generation,
                Err(e) => {
                    warn!(iteration, error = %e, "Generation failed");
                    let error = e.to_string();
                    emitter.emit_final(AgentEvent::Error {
                        error: error.clone(),
                        usage,
                    });
                    return Ok(RunOutcome::Failed { error, usage });
                }
            };
            if let Some(u) = generation.usage {
                usage += u;
            }

            if generation.tool_calls.is_empty() {
                let class = classify_output(
                    &generation.content,
                    &self.dispatcher.tools().names(),
                    self.malformed_policy,
                );
                if class == OutputClass::NormalText {
                    self.conversation.push(Message::assistant(generation.content.clone()));
                    emitter.emit_final(AgentEvent::Complete {
                        reason: CompletionReason::Response,
                        response: Some(generation.content.clone()),
                        tool: None,
                        usage,
                    });
                    return Ok(RunOutcome::Responded {
                        response: generation.content,
                        usage,
                    });
                }

                debug!(iteration, ?class, "No tool call, injecting corrective prompt");
                self.conversation.push(Message::assistant(generation.content));
                self.conversation.push(Message::user(CORRECTIVE_MESSAGE));
                continue;
            }

            emitter.emit(AgentEvent::ToolCallStart {
                count: generation.tool_calls.len(),
            })?;
            self.conversation.push(Message::assistant_with_tools(
                &generation.content,
                generation.tool_calls.clone(),
            ));

            for raw in &generation.tool_calls {
                let call = ToolCall::parse(raw);
                emitter.emit(AgentEvent::ToolCallParsed {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                })?;
                emitter.emit(AgentEvent::ToolExecutionStart {
                    name: call.name.clone(),
                })?;

                let outcome = self.dispatcher.execute(&call, &self.conversation).await;
                debug!(tool = %call.name, chars = outcome.text().len(), "Tool finished");

                self.conversation.push(Message::tool_result(&call.id, outcome.text()));
                emitter.emit(AgentEvent::ToolExecutionEnd {
                    name: call.name.clone(),
                    result: outcome.text().to_string(),
                })?;

                if let ToolOutcome::Submitted { query, .. } = outcome {
                    info!(iteration, total_tokens = usage.total_tokens, "Answer submitted");
                    emitter.emit_final(AgentEvent::Complete {
                        reason: CompletionReason::AnswerSubmitted,
                        response: None,
                        tool: Some(call.name),
                        usage,
                    });
                    return Ok(RunOutcome::Submitted { query, usage });
                }
            }

            emitter.emit(AgentEvent::IterationEnd { iteration })?;
        }

        warn!(max_iterations = self.max_iterations, "Max iterations reached");
        emitter.emit_final(AgentEvent::Error {
            error: MAX_ITERATIONS_ERROR.to_string(),
            usage,
        });
        Ok(RunOutcome::Exhausted { usage })
    }

    /// Stream one generation, forwarding its pieces as events.
    async fn generate(&self, emitter: &Emitter) -> Result<Result<Generation, ProviderError>, Cancelled> {
        emitter.emit(AgentEvent::GenerationStart)?;

        let messages = self.compression.apply(&self.conversation.messages);
        let mut request = ProviderRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature)
            .with_tools(self.dispatcher.tools().definitions());
        if let Some(max) = self.max_tokens {
            request = request.with_max_tokens(max);
        }
        request.stream = true;

        let mut rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => return Ok(Err(e)),
        };

        let mut generation = Generation::default();
        let mut in_thinking = false;

        while let Some(chunk) = rx.recv().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Ok(Err(e)),
            };

            for detail in &chunk.reasoning {
                if detail.kind != "reasoning.text" {
                    continue;
                }
                let Some(text) = detail.text.as_deref().filter(|t| !t.is_empty()) else {
                    continue;
                };
                if !in_thinking {
                    in_thinking = true;
                    emitter.emit(AgentEvent::ThinkingStart)?;
                }
                emitter.emit(AgentEvent::ThinkingChunk { chunk: text.to_string() })?;
            }

            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                if in_thinking {
                    in_thinking = false;
                    emitter.emit(AgentEvent::ThinkingEnd)?;
                }
                generation.content.push_str(&text);
                emitter.emit(AgentEvent::ResponseChunk { chunk: text })?;
            }

            if !chunk.tool_calls.is_empty() {
                generation.tool_calls = chunk.tool_calls;
            }
            if chunk.finish_reason.is_some() {
                generation.finish_reason = chunk.finish_reason;
            }
            if chunk.usage.is_some() {
                generation.usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        if in_thinking {
            emitter.emit(AgentEvent::ThinkingEnd)?;
        }

        emitter.emit(AgentEvent::GenerationEnd {
            full_response: generation.content.clone(),
            tool_calls: generation.tool_calls.clone(),
            finish_reason: generation.finish_reason.clone(),
            usage: generation.usage,
        })?;

        Ok(Ok(generation))
    }
}
