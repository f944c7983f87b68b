//! The full guide lookup: keyword scoring, semantic fallback, LLM check.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::entry::GuideEntry;
use crate::index::GuideIndex;
use crate::score::{self, tokenize};
use crate::semantic::{Embedder, SemanticSearch};
use crate::validate::{GuideValidator, Verdict, resolve_suggestion};

/// Keyword score at which stage 1 is trusted outright.
pub const CONFIDENT_SCORE: u32 = 50;
/// Minimum score for a runner-up to be returned alongside the best guide.
pub const SECOND_GUIDE_MIN_SCORE: u32 = 30;
/// Runner-up must reach this fraction of the top score.
pub const SECOND_GUIDE_RATIO: f64 = 0.6;
const WEAK_SCORE: u32 = 10;
const MODERATE_SCORE: u32 = 2;
const FOOTER_MIN_SCORE: u32 = 5;
const MAX_ALTERNATIVES: usize = 10;

const SECOND_GUIDE_SEPARATOR: &str = "\n\n===== ADDITIONAL GUIDE (also relevant) =====\n\n";
const FOOTER_PREFIX: &str = "\n\n---\nOther potentially relevant guides (call get_business_rules \
again with a different keyword if the question spans multiple domains): ";

/// Selects guide text for a search term.
pub struct GuideRetriever {
    index: GuideIndex,
    semantic: Option<SemanticSearch>,
    validator: Option<Arc<dyn GuideValidator>>,
}

fn include_second(top: u32, runner_up: u32) -> bool {
    runner_up >= SECOND_GUIDE_MIN_SCORE && runner_up as f64 >= top as f64 * SECOND_GUIDE_RATIO
}

impl GuideRetriever {
    pub fn new(index: GuideIndex) -> Self {
        Self {
            index,
            semantic: None,
            validator: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.semantic = Some(SemanticSearch::new(embedder));
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn GuideValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn index(&self) -> &GuideIndex {
        &self.index
    }

    fn entry(&self, i: usize) -> &GuideEntry {
        &self.index.entries()[i]
    }

    /// Up to ten other guides: scored ones first, then the rest in order.
    fn alternatives_for(&self, selected: usize, scored: &[(u32, usize)]) -> Vec<usize> {
        let mut alts: Vec<usize> = Vec::new();
        let candidates = scored.iter().map(|(_, i)| *i).chain(0..self.index.len());
        for i in candidates {
            if alts.len() >= MAX_ALTERNATIVES {
                break;
            }
            if i != selected && !alts.contains(&i) {
                alts.push(i);
            }
        }
        alts
    }

    /// Let the validator swap the selection; any failure keeps it.
    async fn validate(&self, term: &str, selected: usize, scored: &[(u32, usize)]) -> usize {
        let Some(validator) = &self.validator else {
            return selected;
        };
        let alt_indices = self.alternatives_for(selected, scored);
        if alt_indices.is_empty() {
            return selected;
        }
        let alternatives: Vec<&GuideEntry> = alt_indices.iter().map(|&i| self.entry(i)).collect();
        let current = self.entry(selected);

        match validator.judge(term, current, &alternatives).await {
            Ok(Verdict::Correct) => selected,
            Ok(Verdict::Wrong(suggested)) => {
                info!(selected = %current.title, %suggested, "Guide validator override");
                match resolve_suggestion(&suggested, &alternatives) {
                    Some(pos) => alt_indices[pos],
                    None => {
                        warn!(%suggested, "Validator suggested a guide that does not exist");
                        selected
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Guide validator call failed; keeping original");
                selected
            }
        }
    }

    fn assemble(&self, primary: usize, secondary: Option<usize>, others: &[String]) -> String {
        let mut out = self.entry(primary).content.clone();
        if let Some(second) = secondary {
            out.push_str(SECOND_GUIDE_SEPARATOR);
            out.push_str(&self.entry(second).content);
        }
        if !others.is_empty() {
            out.push_str(FOOTER_PREFIX);
            out.push_str(&others.join(", "));
        }
        out
    }

    /// Guide text for `term`, never an error.
    pub async fn retrieve(&self, term: &str) -> String {
        if self.index.is_empty() {
            return "No business rules guides found.".into();
        }

        let tokens = tokenize(term);
        let scored = score::rank(&self.index, &tokens);
        debug!(term, candidates = scored.len(), top = ?scored.first(), "Keyword scoring");

        if let Some(&(top_score, top)) = scored.first()
            && top_score >= CONFIDENT_SCORE
        {
            let best = self.validate(term, top, &scored).await;

            let secondary = scored
                .get(1)
                .filter(|(runner_score, runner)| {
                    *runner != best && include_second(top_score, *runner_score)
                })
                .map(|(_, runner)| *runner);

            let others: Vec<String> = scored
                .iter()
                .skip(2)
                .take(3)
                .filter(|(s, i)| *s >= FOOTER_MIN_SCORE && *i != best && Some(*i) != secondary)
                .map(|(_, i)| self.entry(*i).display_title().to_string())
                .collect();

            return self.assemble(best, secondary, &others);
        }

        if let Some(semantic) = &self.semantic
            && let Some((hit, similarity)) = semantic.best_match(&self.index, term).await
        {
            debug!(guide = %self.entry(hit).stem(), similarity, "Semantic match");
            let best = self.validate(term, hit, &scored).await;
            let others: Vec<String> = scored
                .first()
                .filter(|(_, i)| *i != best)
                .map(|(_, i)| self.entry(*i).display_title().to_string())
                .into_iter()
                .collect();
            return self.assemble(best, None, &others);
        }

        match scored.first() {
            Some(&(top_score, top)) if top_score >= WEAK_SCORE => {
                let best = self.validate(term, top, &scored).await;
                let others: Vec<String> = scored
                    .iter()
                    .skip(1)
                    .take(3)
                    .filter(|(s, i)| *s >= FOOTER_MIN_SCORE && *i != best)
                    .map(|(_, i)| self.entry(*i).display_title().to_string())
                    .collect();
                self.assemble(best, None, &others)
            }
            Some(&(top_score, top)) if top_score >= MODERATE_SCORE => {
                let best = self.validate(term, top, &scored).await;
                format!(
                    "Best match (confidence: moderate):\n\n{}\n\n---\n{}",
                    self.entry(best).content,
                    self.index.catalog()
                )
            }
            _ => format!("No strong match for '{term}'.\n{}", self.index.catalog()),
        }
    }
}
