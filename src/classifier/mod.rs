//! Task classification from free-text descriptions.
//!
//! Classification is keyword-weighted: every category scores one point per
//! distinct keyword found in the lower-cased text, the highest score wins and
//! ties go to the category listed first in the keyword table. A generic
//! "build me an app" description that also names a media domain resolves to
//! that domain. Low-confidence results may be re-checked against a remote
//! zero-shot classifier when one is configured.

mod fallback;
mod keywords;

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

pub use fallback::{FallbackError, ZeroShotClassifier, ZeroShotVerdict};
pub use keywords::{CategoryScore, EMBEDDED_KEYWORDS, KeywordPattern, KeywordTable, KeywordTableError};
use serde::{Deserialize, Serialize};

/// Coarse task category. Declaration order is the default tie-break priority.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Chat,
    Code,
    Audio,
    Video,
    Vision,
    Reasoning,
    Embedding,
    Classification,
    Extraction,
    Development,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 10] = [
        Self::Chat,
        Self::Code,
        Self::Audio,
        Self::Video,
        Self::Vision,
        Self::Reasoning,
        Self::Embedding,
        Self::Classification,
        Self::Extraction,
        Self::Development,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Code => "code",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Vision => "vision",
            Self::Reasoning => "reasoning",
            Self::Embedding => "embedding",
            Self::Classification => "classification",
            Self::Extraction => "extraction",
            Self::Development => "development",
        }
    }

    /// Domains specific enough to override a generic development match.
    pub fn is_specific_domain(&self) -> bool {
        matches!(self, Self::Audio | Self::Video | Self::Vision)
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for TaskCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub category: TaskCategory,
    pub confidence: Confidence,
    pub matched_keywords: Vec<String>,
    pub scores: BTreeMap<TaskCategory, u32>,
    pub used_fallback: bool,
}

/// Score at or above which a single category is a high-confidence match.
const HIGH_CONFIDENCE_SCORE: u32 = 3;
/// Zero-shot score at or above which an adopted label is high confidence.
const FALLBACK_HIGH_SCORE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct TaskClassifier {
    table: Arc<KeywordTable>,
    fallback: Option<ZeroShotClassifier>,
}

impl TaskClassifier {
    pub fn new(table: KeywordTable) -> Self {
        Self {
            table: Arc::new(table),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: ZeroShotClassifier) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Keyword-only classification. Never fails; text with no matches
    /// classifies as low-confidence chat.
    pub fn classify_keywords(&self, text: &str) -> ClassificationResult {
        let lowered = text.to_lowercase();
        let mut ranked = self.table.score(&lowered);
        let scores: BTreeMap<TaskCategory, u32> =
            ranked.iter().map(|s| (s.category, s.score())).collect();

        // Stable: equal scores keep table order.
        ranked.sort_by(|a, b| b.score().cmp(&a.score()).then(a.priority.cmp(&b.priority)));

        let Some(top) = ranked.first().filter(|s| s.score() > 0) else {
            return ClassificationResult {
                category: TaskCategory::Chat,
                confidence: Confidence::Low,
                matched_keywords: Vec::new(),
                scores,
                used_fallback: false,
            };
        };
        let runner_up = ranked.get(1);
        let second_score = runner_up.map_or(0, CategoryScore::score);

        if top.category == TaskCategory::Development
            && let Some(domain) = runner_up
            && domain.score() >= 1
            && domain.category.is_specific_domain()
        {
            let mut matched = domain.matched.clone();
            matched.extend(top.matched.iter().cloned());
            return ClassificationResult {
                category: domain.category,
                confidence: Confidence::Medium,
                matched_keywords: matched,
                scores,
                used_fallback: false,
            };
        }

        let top_score = top.score();
        let confidence = if top_score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if top_score >= 2 || top_score > second_score {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        ClassificationResult {
            category: top.category,
            confidence,
            matched_keywords: top.matched.clone(),
            scores,
            used_fallback: false,
        }
    }

    /// Keyword classification, re-checked against the zero-shot service when
    /// confidence is low. Remote failures fall back to the keyword result.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        let result = self.classify_keywords(text);
        if result.confidence != Confidence::Low {
            return result;
        }
        let Some(fallback) = &self.fallback else {
            return result;
        };

        let labels: Vec<TaskCategory> = self.table.categories().collect();
        match fallback.classify(text, &labels).await {
            Ok(Some(verdict)) => {
                tracing::debug!(
                    category = %verdict.category,
                    score = verdict.score,
                    "Adopted zero-shot classification"
                );
                ClassificationResult {
                    category: verdict.category,
                    confidence: if verdict.score >= FALLBACK_HIGH_SCORE {
                        Confidence::High
                    } else {
                        Confidence::Medium
                    },
                    used_fallback: true,
                    ..result
                }
            }
            Ok(None) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Zero-shot classification failed, keeping keyword result");
                result
            }
        }
    }
}
