//! Price sources feeding the updater.
//!
//! Static sources rebuild their document from the prices shipped with the
//! binary. HTTP sources start from the current document and overwrite the
//! rates of entries they already track; they never add entries.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    catalog::{CATALOG_FILES, CatalogDocument, CatalogFile},
    config::{AzureSourceConfig, OpenRouterSourceConfig, UpdaterConfig},
    formulas::round4,
};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered, but not with anything usable.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status(status) => *status == 429 || *status >= 500,
            Self::Malformed(_) => false,
        }
    }
}

/// A producer of one catalog document.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source name; also selects the catalog file.
    fn name(&self) -> &str;

    /// Build the candidate document. `base` is the current file contents, or
    /// the embedded copy when the file is missing.
    async fn fetch(&self, base: Option<&CatalogDocument>) -> Result<CatalogDocument, SourceError>;
}

/// Rebuilds a document from the embedded price tables.
#[derive(Debug, Clone, Copy)]
pub struct StaticSource {
    file: &'static CatalogFile,
}

impl StaticSource {
    pub fn new(file: &'static CatalogFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl PriceSource for StaticSource {
    fn name(&self) -> &str {
        self.file.source
    }

    async fn fetch(&self, _base: Option<&CatalogDocument>) -> Result<CatalogDocument, SourceError> {
        self.file
            .parse_embedded()
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Azure Retail Prices API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzurePricePage {
    items: Vec<AzurePriceItem>,
    #[serde(default)]
    next_page_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzurePriceItem {
    arm_sku_name: String,
    retail_price: f64,
    #[serde(default)]
    unit_of_measure: String,
    #[serde(default)]
    product_name: String,
    #[serde(default)]
    sku_name: String,
}

impl AzurePriceItem {
    /// Linux pay-as-you-go hourly rates only.
    fn is_linux_on_demand(&self) -> bool {
        self.unit_of_measure == "1 Hour"
            && !self.product_name.contains("Windows")
            && !self.sku_name.contains("Spot")
            && !self.sku_name.contains("Low Priority")
    }
}

/// Virtual machine rates from the Azure Retail Prices API.
#[derive(Debug, Clone)]
pub struct AzureSource {
    client: Client,
    config: AzureSourceConfig,
}

impl AzureSource {
    pub fn new(client: Client, config: AzureSourceConfig) -> Self {
        Self { client, config }
    }

    fn filter(&self, skus: &[&str]) -> String {
        let skus = skus
            .iter()
            .map(|sku| format!("armSkuName eq '{sku}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        format!(
            "serviceName eq 'Virtual Machines' and priceType eq 'Consumption' \
             and armRegionName eq '{}' and ({skus})",
            self.config.region
        )
    }
}

#[async_trait]
impl PriceSource for AzureSource {
    fn name(&self) -> &str {
        "azure"
    }

    async fn fetch(&self, base: Option<&CatalogDocument>) -> Result<CatalogDocument, SourceError> {
        let Some(CatalogDocument::Cloud(base)) = base else {
            return Err(SourceError::Malformed(
                "no cloud document to merge into".into(),
            ));
        };
        let skus: Vec<&str> = base.instances.keys().map(String::as_str).collect();

        let mut cheapest: HashMap<String, f64> = HashMap::new();
        let mut request = self
            .client
            .get(&self.config.api_url)
            .query(&[("$filter", self.filter(&skus))]);
        for page_number in 1..=self.config.max_pages {
            let page: AzurePricePage = get_json(request).await?;
            tracing::debug!(
                page = page_number,
                items = page.items.len(),
                "Fetched Azure price page"
            );
            for item in page.items.iter().filter(|i| i.is_linux_on_demand()) {
                if item.retail_price <= 0.0 {
                    continue;
                }
                cheapest
                    .entry(item.arm_sku_name.clone())
                    .and_modify(|p| *p = p.min(item.retail_price))
                    .or_insert(item.retail_price);
            }
            match page.next_page_link {
                Some(next) if !next.is_empty() => request = self.client.get(next),
                _ => break,
            }
        }

        let mut candidate = base.clone();
        for (sku, instance) in candidate.instances.iter_mut() {
            if let Some(price) = cheapest.get(sku) {
                instance.hourly = round4(*price);
            }
        }
        Ok(CatalogDocument::Cloud(candidate))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenRouter models API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenRouterModels {
    data: Vec<OpenRouterModel>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterModel {
    id: String,
    pricing: OpenRouterPricing,
    #[serde(default)]
    context_length: Option<u64>,
}

/// Prices are decimal strings in dollars per token.
#[derive(Debug, Deserialize)]
struct OpenRouterPricing {
    prompt: String,
    completion: String,
}

fn per_million(per_token: &str) -> Option<f64> {
    let value: f64 = per_token.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| round4(value * 1_000_000.0))
}

/// Token rates from the OpenRouter models API.
#[derive(Debug, Clone)]
pub struct OpenRouterSource {
    client: Client,
    config: OpenRouterSourceConfig,
}

impl OpenRouterSource {
    pub fn new(client: Client, config: OpenRouterSourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl PriceSource for OpenRouterSource {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn fetch(&self, base: Option<&CatalogDocument>) -> Result<CatalogDocument, SourceError> {
        let Some(CatalogDocument::AiModels(base)) = base else {
            return Err(SourceError::Malformed(
                "no model document to merge into".into(),
            ));
        };
        let listing: OpenRouterModels = get_json(self.client.get(&self.config.api_url)).await?;

        let mut candidate = base.clone();
        for model in listing.data {
            let Some(entry) = candidate.models.get_mut(&model.id) else {
                continue;
            };
            match (
                per_million(&model.pricing.prompt),
                per_million(&model.pricing.completion),
            ) {
                (Some(input), Some(output)) => {
                    entry.input_per_million = input;
                    entry.output_per_million = output;
                }
                _ => {
                    tracing::debug!(model = %model.id, "Skipping model with unparseable pricing");
                    continue;
                }
            }
            if let Some(context) = model.context_length {
                entry.context_window = Some(context);
            }
        }
        Ok(CatalogDocument::AiModels(candidate))
    }
}

/// The built-in sources selected by `config.sources`.
pub fn default_sources(config: &UpdaterConfig, client: &Client) -> Vec<Arc<dyn PriceSource>> {
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
    for file in &CATALOG_FILES {
        if !config.includes(file.source) {
            continue;
        }
        let source: Arc<dyn PriceSource> = match file.source {
            "azure" => Arc::new(AzureSource::new(client.clone(), config.azure.clone())),
            "openrouter" => Arc::new(OpenRouterSource::new(
                client.clone(),
                config.openrouter.clone(),
            )),
            _ => Arc::new(StaticSource::new(file)),
        };
        sources.push(source);
    }
    sources
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::catalog::catalog_file;

    fn embedded(source: &str) -> CatalogDocument {
        catalog_file(source).unwrap().parse_embedded().unwrap()
    }

    fn azure(server: &MockServer) -> AzureSource {
        AzureSource::new(
            Client::new(),
            AzureSourceConfig {
                api_url: format!("{}/api/retail/prices", server.uri()),
                ..Default::default()
            },
        )
    }

    fn openrouter(server: &MockServer) -> OpenRouterSource {
        OpenRouterSource::new(
            Client::new(),
            OpenRouterSourceConfig {
                api_url: format!("{}/api/v1/models", server.uri()),
            },
        )
    }

    #[test]
    fn test_per_million() {
        assert_eq!(per_million("0.0000003"), Some(0.3));
        assert_eq!(per_million("0.000015"), Some(15.0));
        assert_eq!(per_million("-1"), None);
        assert_eq!(per_million("free"), None);
    }

    #[test]
    fn test_default_sources_respect_filter() {
        let client = Client::new();
        let all = default_sources(&UpdaterConfig::default(), &client);
        assert_eq!(all.len(), 7);

        let config = UpdaterConfig {
            sources: vec!["openai".into(), "azure".into()],
            ..Default::default()
        };
        let names: Vec<String> = default_sources(&config, &client)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["openai", "azure"]);
    }

    #[tokio::test]
    async fn test_static_source_returns_embedded_document() {
        let source = StaticSource::new(catalog_file("aws").unwrap());
        let doc = source.fetch(None).await.unwrap();
        assert_eq!(doc, embedded("aws"));
    }

    #[tokio::test]
    async fn test_azure_merges_cheapest_linux_rate() {
        let server = MockServer::start().await;
        let next = format!("{}/api/retail/prices/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"armSkuName": "Standard_D2s_v3", "retailPrice": 0.2, "unitOfMeasure": "1 Hour",
                     "productName": "Virtual Machines DSv3 Series Windows", "skuName": "D2s v3"},
                    {"armSkuName": "Standard_D2s_v3", "retailPrice": 0.1, "unitOfMeasure": "1 Hour",
                     "productName": "Virtual Machines DSv3 Series", "skuName": "D2s v3"},
                    {"armSkuName": "Standard_D2s_v3", "retailPrice": 0.02, "unitOfMeasure": "1 Hour",
                     "productName": "Virtual Machines DSv3 Series", "skuName": "D2s v3 Spot"}
                ],
                "NextPageLink": next
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"armSkuName": "Standard_B1s", "retailPrice": 0.011, "unitOfMeasure": "1 Hour",
                     "productName": "Virtual Machines BS Series", "skuName": "B1s"},
                    {"armSkuName": "Standard_Unknown", "retailPrice": 9.0, "unitOfMeasure": "1 Hour",
                     "productName": "Virtual Machines", "skuName": "Unknown"}
                ],
                "NextPageLink": null
            })))
            .mount(&server)
            .await;

        let base = embedded("azure");
        let CatalogDocument::Cloud(doc) = azure(&server).fetch(Some(&base)).await.unwrap() else {
            panic!("expected a cloud document");
        };
        assert_eq!(doc.instances["Standard_D2s_v3"].hourly, 0.1);
        assert_eq!(doc.instances["Standard_B1s"].hourly, 0.011);
        assert!(!doc.instances.contains_key("Standard_Unknown"));
        assert_eq!(doc.instances["Standard_B2s"].hourly, 0.0416);
    }

    #[tokio::test]
    async fn test_azure_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = azure(&server)
            .fetch(Some(&embedded("azure")))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status(503)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_openrouter_updates_tracked_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "deepseek/deepseek-chat", "name": "DeepSeek V3",
                     "pricing": {"prompt": "0.00000027", "completion": "0.0000011"},
                     "context_length": 131072},
                    {"id": "mistralai/mistral-large", "name": "Mistral Large",
                     "pricing": {"prompt": "n/a", "completion": "0.000006"}},
                    {"id": "new/untracked-model", "name": "Untracked",
                     "pricing": {"prompt": "0.000001", "completion": "0.000002"}}
                ]
            })))
            .mount(&server)
            .await;

        let base = embedded("openrouter");
        let CatalogDocument::AiModels(doc) =
            openrouter(&server).fetch(Some(&base)).await.unwrap()
        else {
            panic!("expected a model document");
        };
        let deepseek = &doc.models["deepseek/deepseek-chat"];
        assert_eq!(deepseek.input_per_million, 0.27);
        assert_eq!(deepseek.output_per_million, 1.1);
        assert_eq!(deepseek.context_window, Some(131_072));
        assert_eq!(doc.models["mistralai/mistral-large"].input_per_million, 2.0);
        assert!(!doc.models.contains_key("new/untracked-model"));
    }

    #[tokio::test]
    async fn test_openrouter_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = openrouter(&server)
            .fetch(Some(&embedded("openrouter")))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_http_source_without_base() {
        let server = MockServer::start().await;
        let err = openrouter(&server).fetch(None).await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
