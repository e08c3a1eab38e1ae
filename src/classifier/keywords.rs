//! Keyword table for the task classifier.
//!
//! The table is data, not code: it ships embedded from
//! `data/task_keywords.json` and can be overridden with
//! `classifier.keywords_path`. Entry order in the file is the tie-break
//! priority, so reordering entries changes classification results.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use super::TaskCategory;

/// The embedded keyword table.
pub const EMBEDDED_KEYWORDS: &str = include_str!("../../data/task_keywords.json");

#[derive(Debug, thiserror::Error)]
pub enum KeywordTableError {
    #[error("Failed to read keyword table {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse keyword table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keyword table lists category '{0}' more than once")]
    DuplicateCategory(TaskCategory),

    #[error("Keyword table entry for '{0}' has no keywords")]
    EmptyCategory(TaskCategory),

    #[error("Keyword table has no entries")]
    Empty,
}

/// Triggers for one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordPattern {
    pub category: TaskCategory,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeywordFile {
    #[serde(default)]
    version: Option<u32>,
    categories: Vec<KeywordPattern>,
}

/// Per-category match evidence for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub category: TaskCategory,
    /// Position in the table; lower wins ties.
    pub priority: usize,
    pub matched: Vec<String>,
}

impl CategoryScore {
    pub fn score(&self) -> u32 {
        self.matched.len() as u32
    }
}

/// Ordered, immutable category → keywords mapping.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    version: Option<u32>,
    patterns: Vec<KeywordPattern>,
}

impl KeywordTable {
    pub fn embedded() -> Result<Self, KeywordTableError> {
        Self::from_json(EMBEDDED_KEYWORDS)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeywordTableError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| KeywordTableError::Io(e, path.as_ref().to_path_buf()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, KeywordTableError> {
        let file: KeywordFile = serde_json::from_str(json)?;
        Self::new(file.version, file.categories)
    }

    /// Build a table, lower-casing and de-duplicating keywords while keeping
    /// their first-seen order.
    pub fn new(
        version: Option<u32>,
        patterns: Vec<KeywordPattern>,
    ) -> Result<Self, KeywordTableError> {
        if patterns.is_empty() {
            return Err(KeywordTableError::Empty);
        }

        let mut seen_categories = HashSet::new();
        let mut normalized = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if !seen_categories.insert(pattern.category) {
                return Err(KeywordTableError::DuplicateCategory(pattern.category));
            }
            let mut seen = HashSet::new();
            let keywords: Vec<String> = pattern
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty() && seen.insert(k.clone()))
                .collect();
            if keywords.is_empty() {
                return Err(KeywordTableError::EmptyCategory(pattern.category));
            }
            normalized.push(KeywordPattern {
                category: pattern.category,
                keywords,
            });
        }

        Ok(Self {
            version,
            patterns: normalized,
        })
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn patterns(&self) -> &[KeywordPattern] {
        &self.patterns
    }

    /// Categories in priority order.
    pub fn categories(&self) -> impl Iterator<Item = TaskCategory> + '_ {
        self.patterns.iter().map(|p| p.category)
    }

    /// Score every category against already lower-cased text. Each keyword
    /// counts once no matter how often it occurs.
    pub fn score(&self, lowered: &str) -> Vec<CategoryScore> {
        self.patterns
            .iter()
            .enumerate()
            .map(|(priority, pattern)| CategoryScore {
                category: pattern.category,
                priority,
                matched: pattern
                    .keywords
                    .iter()
                    .filter(|k| lowered.contains(k.as_str()))
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}
