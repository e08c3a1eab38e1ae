use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Price catalog location.
///
/// With no `data_dir`, the catalog embedded in the binary is used and the
/// updater has nowhere to write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> Option<PathBuf> {
    Some(PathBuf::from("./data"))
}

/// Task classifier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Keyword table replacing the embedded one.
    #[serde(default)]
    pub keywords_path: Option<PathBuf>,

    /// Zero-shot fallback for low-confidence keyword matches.
    #[serde(default)]
    pub zero_shot: Option<ZeroShotConfig>,
}

impl ClassifierConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if let Some(zero_shot) = &self.zero_shot {
            if zero_shot.url.trim().is_empty() {
                return Err("classifier.zero_shot.url must not be empty".into());
            }
            if !(0.0..=1.0).contains(&zero_shot.min_score) {
                return Err(format!(
                    "classifier.zero_shot.min_score must be between 0 and 1, got {}",
                    zero_shot.min_score
                ));
            }
            if zero_shot.timeout_ms == 0 {
                return Err("classifier.zero_shot.timeout_ms must be greater than 0".into());
            }
        }
        Ok(())
    }
}

/// A hosted zero-shot classification endpoint (Hugging Face inference API
/// shape: `{"inputs": .., "parameters": {"candidate_labels": [..]}}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ZeroShotConfig {
    pub url: String,

    /// Bearer token. Supports `${VAR}` expansion.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_zero_shot_timeout")]
    pub timeout_ms: u64,

    /// Minimum label score for the fallback verdict to be used.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_zero_shot_timeout() -> u64 {
    3_000
}

fn default_min_score() -> f64 {
    0.5
}
