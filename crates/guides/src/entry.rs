//! Parsing a single guide document into a searchable entry.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use sqlclaw_core::error::GuideError;

/// Words too generic to discriminate between guides.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "has", "its", "with", "from", "this", "that", "these", "those", "data", "rules",
    "standards", "guidelines", "database", "analytics", "metrics", "conventions", "must",
    "should", "when",
];

/// A guide document plus the metadata retrieval needs.
#[derive(Debug, Clone)]
pub struct GuideEntry {
    pub path: PathBuf,
    pub content: String,
    /// First `# ` heading, or empty.
    pub title: String,
    /// Parenthetical from the title with a trailing "Database"/"DB" removed.
    pub schema_hint: String,
    /// Lowercased terms used by keyword scoring.
    pub keywords: BTreeSet<String>,
    /// Title plus section headings; what gets embedded.
    pub summary: String,
}

impl GuideEntry {
    /// File name without extension.
    pub fn stem(&self) -> &str {
        self.path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
    }

    /// Title, falling back to the file stem for untitled guides.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { self.stem() } else { &self.title }
    }
}

/// Compiled patterns for extracting guide metadata.
pub struct GuideParser {
    parenthetical: Regex,
    db_suffix: Regex,
    hint_split: Regex,
    word: Regex,
    single_quoted: Regex,
    backticked: Regex,
}

fn compile(pattern: &str) -> Result<Regex, GuideError> {
    Regex::new(pattern).map_err(|e| GuideError::Validation(format!("bad pattern {pattern}: {e}")))
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

impl GuideParser {
    pub fn new() -> Result<Self, GuideError> {
        Ok(Self {
            parenthetical: compile(r"\(([^)]+)\)")?,
            db_suffix: compile(r"(?i)\s*(Database|DB)\s*$")?,
            hint_split: compile(r"[_\s/]+")?,
            word: compile(r"[A-Za-z]+")?,
            single_quoted: compile(r"'([^']+)'")?,
            backticked: compile(r"`([^`]+)`")?,
        })
    }

    pub fn parse(&self, path: impl Into<PathBuf>, content: impl Into<String>) -> GuideEntry {
        let path = path.into();
        let content = content.into();

        let title = content
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let schema_hint = self
            .parenthetical
            .captures(&title)
            .and_then(|c| c.get(1))
            .map(|inner| self.db_suffix.replace(inner.as_str(), "").trim().to_string())
            .unwrap_or_default();

        let headings: Vec<&str> = content
            .lines()
            .filter_map(|l| l.strip_prefix("## "))
            .map(str::trim)
            .collect();
        let summary = format!("{title}. {}", headings.join(". "));

        let keywords = self.keywords(&path, &content, &title, &schema_hint, &headings);

        GuideEntry {
            path,
            content,
            title,
            schema_hint,
            keywords,
            summary,
        }
    }

    fn keywords(
        &self,
        path: &Path,
        content: &str,
        title: &str,
        schema_hint: &str,
        headings: &[&str],
    ) -> BTreeSet<String> {
        let mut kw = BTreeSet::new();

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        for token in stem.split('_') {
            if token.chars().count() >= 2 {
                kw.insert(token.to_lowercase());
            }
        }

        if !schema_hint.is_empty() {
            kw.insert(schema_hint.to_lowercase());
            for part in self.hint_split.split(schema_hint) {
                if part.chars().count() >= 2 {
                    kw.insert(part.to_lowercase());
                }
            }
        }

        for word in self.word.find_iter(title) {
            let w = word.as_str().to_lowercase();
            if w.len() >= 2 && !is_stopword(&w) {
                kw.insert(w);
            }
        }

        for heading in headings {
            for word in self.word.find_iter(heading) {
                let w = word.as_str().to_lowercase();
                if w.len() >= 3 && !is_stopword(&w) {
                    kw.insert(w);
                }
            }
        }

        for cap in self.single_quoted.captures_iter(content) {
            if let Some(term) = cap.get(1).map(|m| m.as_str())
                && term.chars().count() <= 20
            {
                kw.insert(term.to_lowercase());
            }
        }
        for cap in self.backticked.captures_iter(content) {
            if let Some(term) = cap.get(1).map(|m| m.as_str())
                && term.chars().count() <= 30
            {
                kw.insert(term.to_lowercase());
            }
        }

        kw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLIGHTS: &str = "# Flight Operations Rules (On_Time DB)\n\n\
        Intro text.\n\n\
        ## Delay Classification\n\
        Use `arr_delay` not `dep_delay`. Status 'cancelled' rows are excluded.\n\n\
        ## Carrier Codes\n\
        Text.\n";

    fn parse(name: &str, content: &str) -> GuideEntry {
        GuideParser::new().unwrap().parse(format!("/guides/{name}.md"), content)
    }

    #[test]
    fn extracts_title_hint_and_summary() {
        let entry = parse("flight_ops", FLIGHTS);
        assert_eq!(entry.title, "Flight Operations Rules (On_Time DB)");
        assert_eq!(entry.schema_hint, "On_Time");
        assert_eq!(
            entry.summary,
            "Flight Operations Rules (On_Time DB). Delay Classification. Carrier Codes"
        );
        assert_eq!(entry.stem(), "flight_ops");
    }

    #[test]
    fn keywords_from_every_source() {
        let entry = parse("flight_ops", FLIGHTS);
        for expected in [
            "flight", "ops", "on_time", "on", "time", "operations", "delay", "classification",
            "carrier", "codes", "arr_delay", "dep_delay", "cancelled",
        ] {
            assert!(entry.keywords.contains(expected), "missing {expected}");
        }
        // Stopwords from the title are dropped
        assert!(!entry.keywords.contains("rules"));
    }

    #[test]
    fn database_suffix_case_insensitive() {
        let entry = parse("x", "# Sales (retail_sales database)\n");
        assert_eq!(entry.schema_hint, "retail_sales");
    }

    #[test]
    fn untitled_guide_falls_back_to_stem() {
        let entry = parse("misc_notes", "no heading here\n");
        assert_eq!(entry.title, "");
        assert_eq!(entry.schema_hint, "");
        assert_eq!(entry.display_title(), "misc_notes");
        assert_eq!(entry.summary, ". ");
    }

    #[test]
    fn long_quoted_terms_are_skipped() {
        let entry = parse("x", "# T\n'this quoted phrase is far too long' and `short`\n");
        assert!(entry.keywords.contains("short"));
        assert!(!entry.keywords.iter().any(|k| k.starts_with("this quoted")));
    }
}
