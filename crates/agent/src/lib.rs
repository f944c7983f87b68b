//! The sqlclaw agent loop.
//!
//! The agent follows a **generate → dispatch → check** cycle:
//!
//! 1. **Receive** a natural-language question
//! 2. **Stream** a generation from the provider over the (optionally
//!    compressed) conversation
//! 3. **If tool calls**: dispatch them, with the submission tool guarded by
//!    a verifier gate, append results, loop back to step 2
//! 4. **If a submission is accepted**: the run is complete
//! 5. **If text only**: recover empty or JSON-shaped output, otherwise
//!    treat the text as the final response
//!
//! The loop stops on submission, on a final text response, or when the
//! iteration budget runs out.

pub mod classify;
pub mod context;
pub mod dispatch;
pub mod loop_runner;
pub mod stream_event;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classify::{MalformedOutputPolicy, OutputClass, classify_output};
pub use context::{CompressionSettings, compress};
pub use dispatch::{RULES_TOOL_NAME, SCHEMA_TOOL_NAME, ToolDispatcher, ToolOutcome, VerificationGate};
pub use loop_runner::{Agent, RunOutcome};
pub use stream_event::{AgentEvent, CompletionReason};
pub use verifier::{LlmVerifier, Verifier, VerifierResult};
