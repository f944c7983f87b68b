//! The guide index, built once from a directory of markdown files.

use std::path::Path;

use sqlclaw_core::error::GuideError;
use tracing::{debug, info};

use crate::entry::{GuideEntry, GuideParser};

/// All known guides, ordered by path.
#[derive(Debug, Clone, Default)]
pub struct GuideIndex {
    entries: Vec<GuideEntry>,
}

impl GuideIndex {
    /// Index every `*.md` file directly inside `dir`.
    ///
    /// A missing directory yields an empty index.
    pub fn load_dir(dir: &Path) -> Result<Self, GuideError> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Guides directory not found, index is empty");
            return Ok(Self::default());
        }

        let read_err = |e: std::io::Error| GuideError::Read {
            path: dir.display().to_string(),
            reason: e.to_string(),
        };

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(read_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        let parser = GuideParser::new()?;
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|e| GuideError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            entries.push(parser.parse(path, content));
        }

        info!(dir = %dir.display(), guides = entries.len(), "Guide index built");
        Ok(Self { entries })
    }

    /// Build from already-parsed entries; they are sorted by path.
    pub fn from_entries(mut entries: Vec<GuideEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { entries }
    }

    pub fn entries(&self) -> &[GuideEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&GuideEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Listing of every guide, shown when nothing matches well.
    pub fn catalog(&self) -> String {
        let mut lines = vec![format!("Available guides ({}):", self.entries.len()), String::new()];
        for entry in &self.entries {
            if entry.schema_hint.is_empty() {
                lines.push(format!("  - {}", entry.stem()));
            } else {
                lines.push(format!("  - {}  (schema: {})", entry.stem(), entry.schema_hint));
            }
        }
        lines.push(String::new());
        lines.push("Try searching with a schema name or domain keyword.".into());
        lines.join("\n")
    }
}
