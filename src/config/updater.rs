use serde::{Deserialize, Serialize};

/// Price catalog updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct UpdaterConfig {
    /// Run the periodic worker under `costwise serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between update cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Run a cycle immediately when the worker starts.
    #[serde(default)]
    pub run_on_startup: bool,

    /// Per-fetch timeout for each source.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Delay before the retry of a failed fetch.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Retries after the first failed fetch.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Reload the in-memory catalog after a cycle that wrote files.
    #[serde(default = "default_true")]
    pub reload_catalog: bool,

    /// Sources to run. Empty means all.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub azure: AzureSourceConfig,

    #[serde(default)]
    pub openrouter: OpenRouterSourceConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            run_on_startup: false,
            fetch_timeout_secs: default_fetch_timeout(),
            retry_delay_ms: default_retry_delay(),
            max_retries: default_max_retries(),
            reload_catalog: true,
            sources: Vec::new(),
            azure: AzureSourceConfig::default(),
            openrouter: OpenRouterSourceConfig::default(),
        }
    }
}

impl UpdaterConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("updater.interval_secs must be greater than 0".into());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("updater.fetch_timeout_secs must be greater than 0".into());
        }
        if self.max_retries > 5 {
            return Err(format!(
                "updater.max_retries must be at most 5, got {}",
                self.max_retries
            ));
        }
        if let Some(unknown) = self
            .sources
            .iter()
            .find(|s| crate::catalog::catalog_file(s).is_none())
        {
            return Err(format!("updater.sources: unknown source '{unknown}'"));
        }
        if self.azure.max_pages == 0 {
            return Err("updater.azure.max_pages must be greater than 0".into());
        }
        Ok(())
    }

    /// Whether `source` is selected by the `sources` filter.
    pub fn includes(&self, source: &str) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|s| s == source)
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    86_400
}

fn default_fetch_timeout() -> u64 {
    5
}

fn default_retry_delay() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    1
}

/// Azure Retail Prices API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AzureSourceConfig {
    #[serde(default = "default_azure_url")]
    pub api_url: String,

    /// ARM region name used in the price filter.
    #[serde(default = "default_azure_region")]
    pub region: String,

    /// Upper bound on followed `NextPageLink` pages.
    #[serde(default = "default_azure_pages")]
    pub max_pages: u32,
}

impl Default for AzureSourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_azure_url(),
            region: default_azure_region(),
            max_pages: default_azure_pages(),
        }
    }
}

fn default_azure_url() -> String {
    "https://prices.azure.com/api/retail/prices".into()
}

fn default_azure_region() -> String {
    "eastus".into()
}

fn default_azure_pages() -> u32 {
    3
}

/// OpenRouter models API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct OpenRouterSourceConfig {
    #[serde(default = "default_openrouter_url")]
    pub api_url: String,
}

impl Default for OpenRouterSourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_openrouter_url(),
        }
    }
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1/models".into()
}
