//! Embedding similarity, the second retrieval stage.
//!
//! Guide summaries are embedded lazily on first use and the vectors are
//! kept for the life of the index. Any embedding failure makes the stage
//! report "no match" instead of failing the lookup.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::GuideError;
use sqlclaw_core::provider::{EmbeddingRequest, Provider};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::index::GuideIndex;

/// Minimum cosine similarity for a semantic match.
pub const SIMILARITY_THRESHOLD: f32 = 0.25;

/// Turns texts into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GuideError>;
}

/// An [`Embedder`] backed by a provider's embeddings endpoint.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GuideError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await
            .map_err(|e| GuideError::EmbeddingUnavailable(e.to_string()))?;
        if response.embeddings.len() != texts.len() {
            return Err(GuideError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for empty, zero-norm or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Scale to unit length; zero vectors are left alone.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Lazily embedded guide summaries.
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
    guide_vectors: OnceCell<Vec<Vec<f32>>>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            guide_vectors: OnceCell::new(),
        }
    }

    async fn embed_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GuideError> {
        let mut vectors = self.embedder.embed(texts).await?;
        vectors.iter_mut().for_each(|v| l2_normalize(v));
        Ok(vectors)
    }

    /// Best guide for `query` as (index, similarity), if above threshold.
    ///
    /// A failed guide embedding is not cached, so the next lookup retries.
    pub async fn best_match(&self, index: &GuideIndex, query: &str) -> Option<(usize, f32)> {
        if index.is_empty() {
            return None;
        }

        let guides = match self
            .guide_vectors
            .get_or_try_init(|| async {
                let summaries: Vec<String> = index.entries().iter().map(|e| e.summary.clone()).collect();
                debug!(guides = summaries.len(), "Embedding guide summaries");
                self.embed_normalized(&summaries).await
            })
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Guide embeddings unavailable, skipping semantic stage");
                return None;
            }
        };

        if guides.len() != index.len() {
            warn!(
                guides = index.len(),
                embeddings = guides.len(),
                "Embedding count does not match guide count, skipping semantic stage"
            );
            return None;
        }

        let query_vec = match self.embed_normalized(&[query.to_string()]).await {
            Ok(mut v) if !v.is_empty() => v.swap_remove(0),
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, skipping semantic stage");
                return None;
            }
        };

        let (best, similarity) = guides
            .iter()
            .enumerate()
            .map(|(i, g)| (i, cosine_similarity(g, &query_vec)))
            .fold(None, |acc: Option<(usize, f32)>, (i, s)| match acc {
                Some((_, best)) if best >= s => acc,
                _ => Some((i, s)),
            })?;

        debug!(best, similarity, "Semantic best match");
        (similarity >= SIMILARITY_THRESHOLD).then_some((best, similarity))
    }
}
