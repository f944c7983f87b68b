//! Keyword scoring, the first and cheapest retrieval stage.

use crate::entry::GuideEntry;
use crate::index::GuideIndex;

pub const EXACT_HINT: u32 = 100;
pub const HINT_SUBSTRING: u32 = 50;
pub const EXACT_KEYWORD: u32 = 10;
pub const KEYWORD_SUBSTRING: u32 = 5;
pub const TITLE_SUBSTRING: u32 = 3;
pub const STEM_SUBSTRING: u32 = 2;

/// Split a search term on whitespace, commas, underscores and slashes.
///
/// Fragments shorter than two characters are dropped; if nothing is left
/// the trimmed term itself is the only token.
pub fn tokenize(term: &str) -> Vec<String> {
    let tokens: Vec<String> = term
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '_' | '/'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        vec![term.trim().to_string()]
    } else {
        tokens
    }
}

fn token_score(entry: &GuideEntry, token: &str) -> u32 {
    let hint = entry.schema_hint.to_lowercase();
    if !hint.is_empty() {
        if token == hint {
            return EXACT_HINT;
        }
        if hint.contains(token) {
            return HINT_SUBSTRING;
        }
    }
    if entry.keywords.contains(token) {
        return EXACT_KEYWORD;
    }
    if entry
        .keywords
        .iter()
        .any(|kw| kw.contains(token) || token.contains(kw.as_str()))
    {
        return KEYWORD_SUBSTRING;
    }
    if entry.title.to_lowercase().contains(token) {
        return TITLE_SUBSTRING;
    }
    if entry.stem().to_lowercase().contains(token) {
        return STEM_SUBSTRING;
    }
    0
}

/// Sum of per-token scores; each token counts its best-priority match only.
pub fn score_entry(entry: &GuideEntry, tokens: &[String]) -> u32 {
    tokens
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| token_score(entry, &t))
        .sum()
}

/// Indices of entries with a positive score, best first.
///
/// Ties keep index order.
pub fn rank(index: &GuideIndex, tokens: &[String]) -> Vec<(u32, usize)> {
    let mut scored: Vec<(u32, usize)> = index
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| (score_entry(e, tokens), i))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::GuideParser;

    fn entry(name: &str, content: &str) -> GuideEntry {
        GuideParser::new().unwrap().parse(format!("/g/{name}.md"), content)
    }

    #[test]
    fn tokenize_splits_and_filters() {
        assert_eq!(tokenize("on_time, flights/delay x"), vec!["on", "time", "flights", "delay"]);
        assert_eq!(tokenize(" x "), vec!["x"]);
        assert_eq!(tokenize("On_Time"), vec!["On", "Time"]);
    }

    #[test]
    fn exact_schema_hint_scores_highest() {
        let e = entry("flights", "# Flights (On_Time DB)\n");
        assert_eq!(score_entry(&e, &["on_time".to_string()]), EXACT_HINT);
        assert_eq!(score_entry(&e, &["ON_TIME".to_string()]), EXACT_HINT);
    }

    #[test]
    fn hint_substring_beats_keywords() {
        let e = entry("flights", "# Flights (On_Time DB)\n");
        // "time" is also a keyword, but the hint check runs first
        assert_eq!(score_entry(&e, &["time".to_string()]), HINT_SUBSTRING);
    }

    #[test]
    fn keyword_matches() {
        let e = entry("flights", "# Flights (On_Time DB)\n## Delay Buckets\n");
        assert_eq!(score_entry(&e, &["delay".to_string()]), EXACT_KEYWORD);
        assert_eq!(score_entry(&e, &["delays".to_string()]), KEYWORD_SUBSTRING);
        assert_eq!(score_entry(&e, &["bucket".to_string()]), KEYWORD_SUBSTRING);
    }

    #[test]
    fn tokens_accumulate() {
        let e = entry("flights", "# Flights (On_Time DB)\n## Delay Buckets\n");
        let tokens = tokenize("on_time delay");
        // "on" and "time" are both hint substrings, "delay" an exact keyword
        assert_eq!(score_entry(&e, &tokens), HINT_SUBSTRING * 2 + EXACT_KEYWORD);
    }

    #[test]
    fn no_match_scores_zero() {
        let e = entry("flights", "# Flights (On_Time DB)\n");
        assert_eq!(score_entry(&e, &["payroll".to_string()]), 0);
        assert_eq!(score_entry(&e, &[String::new()]), 0);
    }

    #[test]
    fn rank_orders_and_drops_zero() {
        let parser = GuideParser::new().unwrap();
        let index = GuideIndex::from_entries(vec![
            parser.parse("/g/a_payroll.md", "# Payroll (HR DB)\n"),
            parser.parse("/g/b_flights.md", "# Flights (On_Time DB)\n## Delay\n"),
            parser.parse("/g/c_ops.md", "# Ops\n## Delay Reporting\n"),
        ]);
        let ranked = rank(&index, &tokenize("on_time delay"));
        assert_eq!(ranked, vec![(110, 1), (10, 2)]);
    }
}
