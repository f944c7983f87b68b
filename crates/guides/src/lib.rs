//! Business-rules guides and the retrieval pipeline that selects them.
//!
//! Guides are markdown documents (`# Title (Schema Hint)`, `## Sections`,
//! free text) describing the filters, exclusions and conventions a query
//! against a given schema must respect. [`GuideRetriever::retrieve`] picks
//! the right one for a search term in up to three stages:
//!
//! 1. keyword scoring over an index built once at startup
//! 2. embedding similarity, when keyword scoring is inconclusive
//! 3. an optional LLM judge that may swap in a better alternative

pub mod entry;
pub mod index;
pub mod retriever;
pub mod score;
pub mod semantic;
pub mod validate;

pub use entry::{GuideEntry, GuideParser};
pub use index::GuideIndex;
pub use retriever::GuideRetriever;
pub use score::{score_entry, tokenize};
pub use semantic::{Embedder, ProviderEmbedder, SemanticSearch, cosine_similarity};
pub use validate::{GuideValidator, LlmGuideValidator, Verdict};
