//! LLM Provider implementations for sqlclaw.
//!
//! All providers implement the `sqlclaw_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::{OpenAiCompatProvider, SseDecoder};
