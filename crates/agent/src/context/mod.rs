//! The view of a conversation that is actually sent to the model.
//!
//! The stored conversation is never edited. Before each generation call it
//! may be projected through [`compress`], which shrinks old tool results
//! and collapses repeated identical calls.

pub mod compress;

pub use compress::{CompressionSettings, DUPLICATE_PLACEHOLDER, compress, truncate_tool_result};
