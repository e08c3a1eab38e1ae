//! Configuration for the cost-estimation service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [catalog]
//! data_dir = "./data"
//!
//! [classifier.zero_shot]
//! url = "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
//! api_key = "${HF_API_TOKEN}"
//!
//! [updater]
//! interval_secs = 86400
//! ```

mod catalog;
mod observability;
mod server;
mod updater;

use std::{path::Path, sync::LazyLock};

pub use catalog::*;
pub use observability::*;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
pub use server::*;
pub use updater::*;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CostwiseConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Price catalog location.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Task classifier configuration.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Price catalog updater.
    #[serde(default)]
    pub updater: UpdaterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Configuration written by `costwise init`.
pub const DEFAULT_CONFIG: &str = r#"# costwise configuration

[server]
host = "0.0.0.0"
port = 8080

[catalog]
data_dir = "./data"

# Optional zero-shot fallback for low-confidence task classification.
# [classifier.zero_shot]
# url = "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
# api_key = "${HF_API_TOKEN}"
# timeout_ms = 3000
# min_score = 0.5

[updater]
enabled = true
interval_secs = 86400
run_on_startup = false
fetch_timeout_secs = 5
reload_catalog = true

[observability.logging]
level = "info"
format = "compact"
"#;

impl CostwiseConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: CostwiseConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate().map_err(ConfigError::Validation)?;
        self.classifier.validate().map_err(ConfigError::Validation)?;
        self.updater.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }

    /// Generate the JSON schema for the configuration file.
    #[cfg(feature = "json-schema")]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CostwiseConfig)
    }

    /// Generate the JSON schema as a pretty-printed JSON string.
    #[cfg(feature = "json-schema")]
    pub fn json_schema_string() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// `${NAME}` placeholders, anywhere before a `#` on their line.
static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|_| unreachable!()));

/// Substitute environment variables into the raw config text. Comments are
/// copied through untouched; an unset variable is an error.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(input.len());
    for (idx, line) in input.split('\n').enumerate() {
        if idx > 0 {
            expanded.push('\n');
        }
        let (code, comment) = line.split_at(line.find('#').unwrap_or(line.len()));

        let mut missing = None;
        let code = ENV_VAR.replace_all(code, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            })
        });
        if let Some(name) = missing {
            return Err(ConfigError::EnvVarNotFound(name));
        }

        expanded.push_str(&code);
        expanded.push_str(comment);
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CostwiseConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.updater.interval_secs, 86_400);
        assert_eq!(config.updater.fetch_timeout_secs, 5);
        assert!(config.classifier.zero_shot.is_none());
    }

    #[test]
    fn test_default_config_parses() {
        let config = CostwiseConfig::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(
            config.catalog.data_dir.as_deref(),
            Some(Path::new("./data"))
        );
        assert!(config.updater.reload_catalog);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = CostwiseConfig::from_str(
            r#"
            [server]
            prot = 8080
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_shot_section() {
        temp_env::with_var("TEST_HF_TOKEN", Some("hf_secret"), || {
            let config = CostwiseConfig::from_str(
                r#"
                [classifier.zero_shot]
                url = "https://example.test/zero-shot"
                api_key = "${TEST_HF_TOKEN}"
                min_score = 0.6
            "#,
            )
            .unwrap();
            let zero_shot = config.classifier.zero_shot.unwrap();
            assert_eq!(zero_shot.api_key.as_deref(), Some("hf_secret"));
            assert_eq!(zero_shot.min_score, 0.6);
            assert_eq!(zero_shot.timeout_ms, 3_000);
        });
    }

    #[test]
    fn test_invalid_min_score_rejected() {
        let err = CostwiseConfig::from_str(
            r#"
            [classifier.zero_shot]
            url = "https://example.test"
            min_score = 1.5
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("COSTWISE_MISSING_VAR", || {
            let err = CostwiseConfig::from_str("[classifier.zero_shot]\nurl = \"${COSTWISE_MISSING_VAR}\"")
                .unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "COSTWISE_MISSING_VAR"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# api_key = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# api_key = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_before_comment_expanded() {
        temp_env::with_var("TEST_BEFORE_COMMENT", Some("expanded"), || {
            let result =
                expand_env_vars("key = \"${TEST_BEFORE_COMMENT}\" # ${NOT_EXPANDED}").unwrap();
            assert_eq!(result, "key = \"expanded\" # ${NOT_EXPANDED}");
        });
    }
}
