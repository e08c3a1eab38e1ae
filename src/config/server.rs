use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use http::{HeaderValue, Method, header};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// `[server]`: listener, request limits and the shared outbound client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,

    /// Largest accepted request body, in bytes.
    pub body_limit_bytes: usize,

    /// Requests running longer than this are answered with 408.
    pub timeout_secs: u64,

    pub cors: CorsConfig,

    /// Client used for price sources and the zero-shot classifier.
    pub http_client: HttpClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            body_limit_bytes: 64 * 1024,
            timeout_secs: 30,
            cors: CorsConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }
}

impl ServerConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        let zero = [
            ("server.body_limit_bytes", self.body_limit_bytes as u64),
            ("server.timeout_secs", self.timeout_secs),
            ("server.http_client.timeout_secs", self.http_client.timeout_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(format!("{name} must be greater than 0")),
            None => Ok(()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[server.cors]`. The API only serves GET and POST, so only origins and
/// preflight caching are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub enabled: bool,

    /// Exact origins, or `["*"]` for any. Empty rejects cross-origin calls.
    pub allowed_origins: Vec<String>,

    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    /// `None` when CORS is disabled. Unparseable origins are logged and
    /// left out.
    pub fn into_layer(self) -> Option<CorsLayer> {
        if !self.enabled {
            return None;
        }

        let allow_origin = if self.allowed_origins.iter().any(|o| o == "*") {
            tracing::warn!("CORS allows any origin");
            AllowOrigin::any()
        } else {
            let origins = self.allowed_origins.iter().filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .inspect_err(|_| tracing::warn!(%origin, "Ignoring invalid CORS origin"))
                    .ok()
            });
            AllowOrigin::list(origins)
        };

        Some(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .max_age(Duration::from_secs(self.max_age_secs)),
        )
    }
}

/// `[server.http_client]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Upper bound for any outbound request. Price fetches are additionally
    /// cut off by `updater.fetch_timeout_secs`.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_idle_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 90,
            user_agent: concat!("costwise/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.host.is_unspecified());
        assert!(config.http_client.user_agent.starts_with("costwise/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: ServerConfig = toml::from_str("port = 9000\n[cors]\nenabled = false").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.cors.enabled);
        assert_eq!(config.cors.max_age_secs, 3600);
    }

    #[rstest]
    #[case::body_limit("body_limit_bytes = 0", "server.body_limit_bytes")]
    #[case::timeout("timeout_secs = 0", "server.timeout_secs")]
    #[case::client_timeout("[http_client]\ntimeout_secs = 0", "server.http_client.timeout_secs")]
    fn test_zero_values_rejected(#[case] toml: &str, #[case] field: &str) {
        let config: ServerConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.starts_with(field), "{err}");
    }

    #[rstest]
    #[case::disabled(false, vec![], false)]
    #[case::no_origins(true, vec![], true)]
    #[case::any(true, vec!["*"], true)]
    #[case::listed(true, vec!["https://app.example.com", "not a header\n"], true)]
    fn test_cors_layer(
        #[case] enabled: bool,
        #[case] origins: Vec<&str>,
        #[case] expect_layer: bool,
    ) {
        let cors = CorsConfig {
            enabled,
            allowed_origins: origins.into_iter().map(String::from).collect(),
            ..Default::default()
        };
        assert_eq!(cors.into_layer().is_some(), expect_layer);
    }

    #[test]
    fn test_build_client() {
        assert!(HttpClientConfig::default().build_client().is_ok());
    }
}
