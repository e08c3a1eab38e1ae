//! Catalog listing: which providers, models, instances and services exist.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ResolveError, owned};
use crate::catalog::{CatalogSourceInfo, PriceCatalog};

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CatalogListingRequest {
    /// Only list this provider (AI or cloud) or "saas"
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudListing {
    pub region: Option<String>,
    pub instances: Vec<String>,
    pub storage_classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub sources: Vec<CatalogSourceInfo>,
    /// AI provider → model IDs
    pub ai_models: BTreeMap<String, Vec<String>>,
    pub cloud: BTreeMap<String, CloudListing>,
    /// SaaS category → service names
    pub saas: BTreeMap<String, Vec<String>>,
}

pub fn list_catalog(
    catalog: &PriceCatalog,
    request: &CatalogListingRequest,
) -> Result<CatalogListing, ResolveError> {
    let wanted = request.provider.as_deref().map(str::to_ascii_lowercase);
    if let Some(provider) = &wanted {
        let known = provider == "saas"
            || catalog.ai_provider(provider).is_some()
            || catalog.cloud(provider).is_some();
        if !known {
            let mut providers = owned(catalog.ai_providers());
            providers.extend(owned(catalog.cloud_providers()));
            providers.push("saas".to_string());
            return Err(ResolveError::UnknownProvider {
                provider: provider.clone(),
                known: providers,
            });
        }
    }
    let include = |name: &str| wanted.as_deref().is_none_or(|w| w == name);

    let ai_models = catalog
        .ai_providers()
        .into_iter()
        .filter(|p| include(p))
        .map(|p| {
            let ids = catalog
                .provider_models(p)
                .map(|m| m.id.to_string())
                .collect();
            (p.to_string(), ids)
        })
        .collect();

    let cloud = catalog
        .cloud_documents()
        .filter(|(p, _)| include(p))
        .map(|(p, doc)| {
            (
                p.to_string(),
                CloudListing {
                    region: doc.region.clone(),
                    instances: doc.instances.keys().cloned().collect(),
                    storage_classes: doc.storage.keys().cloned().collect(),
                },
            )
        })
        .collect();

    let mut saas: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if include("saas") {
        for (name, service) in &catalog.saas().services {
            saas.entry(service.category.clone())
                .or_default()
                .push(name.clone());
        }
    }

    Ok(CatalogListing {
        sources: catalog.sources().to_vec(),
        ai_models,
        cloud,
        saas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PriceCatalog {
        PriceCatalog::embedded().unwrap()
    }

    #[test]
    fn test_full_listing() {
        let listing = list_catalog(&catalog(), &CatalogListingRequest::default()).unwrap();
        assert_eq!(listing.sources.len(), 7);
        assert!(listing.ai_models["openai"].contains(&"gpt-4.1".to_string()));
        assert!(listing.cloud["aws"].instances.contains(&"m5.large".to_string()));
        assert!(listing.saas["database"].contains(&"neon".to_string()));
    }

    #[test]
    fn test_provider_filter() {
        let request = CatalogListingRequest {
            provider: Some("GCP".into()),
        };
        let listing = list_catalog(&catalog(), &request).unwrap();
        assert!(listing.ai_models.is_empty());
        assert!(listing.saas.is_empty());
        assert_eq!(listing.cloud.keys().collect::<Vec<_>>(), vec!["gcp"]);
    }

    #[test]
    fn test_unknown_provider() {
        let request = CatalogListingRequest {
            provider: Some("oracle".into()),
        };
        let err = list_catalog(&catalog(), &request).unwrap_err();
        assert_eq!(err.code(), "unknown_provider");
        assert!(err.valid_values().unwrap().contains(&"saas".to_string()));
    }
}
