//! LLM judgement of a guide selection, the optional third stage.

use std::sync::Arc;

use async_trait::async_trait;
use sqlclaw_core::error::GuideError;
use sqlclaw_core::message::Message;
use sqlclaw_core::provider::{Provider, ProviderRequest};

use crate::entry::GuideEntry;

const SYSTEM_PROMPT: &str = "You validate whether the correct business rules guide was retrieved \
for a database query. You will see the search term, the selected guide, and a list of \
alternative guides.

Respond with EXACTLY one of:
- \"CORRECT\" if the selected guide matches the search domain
- \"WRONG: <exact title of the better alternative>\" if a listed alternative is more appropriate
";

/// What the judge said about a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    /// The title the judge prefers, quotes stripped.
    Wrong(String),
}

impl Verdict {
    /// Anything other than a `WRONG:` answer keeps the selection.
    pub fn parse(response: &str) -> Self {
        let response = response.trim();
        match response.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("wrong:") => {
                let suggested = response[6..]
                    .trim()
                    .trim_matches('"')
                    .trim_matches('\'')
                    .to_string();
                Verdict::Wrong(suggested)
            }
            _ => Verdict::Correct,
        }
    }
}

/// Judges whether a selected guide fits a search term.
#[async_trait]
pub trait GuideValidator: Send + Sync {
    async fn judge(
        &self,
        search_term: &str,
        selected: &GuideEntry,
        alternatives: &[&GuideEntry],
    ) -> Result<Verdict, GuideError>;
}

/// A [`GuideValidator`] that asks a chat model.
pub struct LlmGuideValidator {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmGuideValidator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

/// The user turn shown to the judge.
pub fn judge_prompt(search_term: &str, selected: &GuideEntry, alternatives: &[&GuideEntry]) -> String {
    let alt_lines: Vec<String> = alternatives
        .iter()
        .map(|e| format!("- {} (schema: {})", e.title, e.schema_hint))
        .collect();
    format!(
        "Search term: {search_term}\n\nSelected guide: {} (schema: {})\n\nAlternative guides:\n{}",
        selected.title,
        selected.schema_hint,
        alt_lines.join("\n")
    )
}

#[async_trait]
impl GuideValidator for LlmGuideValidator {
    async fn judge(
        &self,
        search_term: &str,
        selected: &GuideEntry,
        alternatives: &[&GuideEntry],
    ) -> Result<Verdict, GuideError> {
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(judge_prompt(search_term, selected, alternatives)),
            ],
        )
        .with_temperature(0.0);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| GuideError::Validation(e.to_string()))?;
        Ok(Verdict::parse(response.message.text()))
    }
}

/// Position of the alternative a suggested title refers to.
///
/// Matches a case-insensitive substring of the title (either direction)
/// first, then a substring of the schema hint.
pub fn resolve_suggestion(suggested: &str, alternatives: &[&GuideEntry]) -> Option<usize> {
    let suggested = suggested.to_lowercase();
    if suggested.is_empty() {
        return None;
    }
    alternatives
        .iter()
        .position(|alt| {
            let title = alt.display_title().to_lowercase();
            title.contains(&suggested) || suggested.contains(&title)
        })
        .or_else(|| {
            alternatives.iter().position(|alt| {
                !alt.schema_hint.is_empty() && alt.schema_hint.to_lowercase().contains(&suggested)
            })
        })
}
