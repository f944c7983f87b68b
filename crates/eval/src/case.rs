//! Evaluation cases and their JSON loader.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// One question and the gold query that answers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub prompt: String,
    #[serde(rename = "query")]
    pub gold_query: String,
}

impl EvalCase {
    pub fn new(prompt: impl Into<String>, gold_query: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            gold_query: gold_query.into(),
        }
    }
}

/// Load a JSON array of `{"prompt": ..., "query": ...}` objects.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>, EvalError> {
    let text = std::fs::read_to_string(path).map_err(|e| EvalError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| EvalError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_prompt_and_gold_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[{"prompt": "How many flights?", "query": "SELECT COUNT(*) FROM airline.flights"}]"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(
            cases,
            vec![EvalCase::new("How many flights?", "SELECT COUNT(*) FROM airline.flights")]
        );
    }

    #[test]
    fn missing_file_and_bad_json_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_cases(&dir.path().join("nope.json")),
            Err(EvalError::Read { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"prompt": "no query"}]"#).unwrap();
        assert!(matches!(load_cases(&path), Err(EvalError::Parse { .. })));
    }
}
