//! Thread-safe catalog registry.
//!
//! Resolvers work on an immutable [`PriceCatalog`] snapshot. Reloading builds
//! a complete new catalog and swaps it in, so a request never observes a
//! half-updated price table.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::{
    CATALOG_FILES, CatalogFile,
    types::{AiModelEntry, AiModelsDocument, CatalogDocument, CloudDocument, SaasDocument},
};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to parse catalog file {file}: {source}")]
    Parse {
        file: String,
        source: serde_json::Error,
    },
}

/// Where a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    File,
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSourceInfo {
    pub source: String,
    pub origin: CatalogOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A model entry together with its catalog keys.
#[derive(Debug, Clone, Copy)]
pub struct ModelRef<'a> {
    pub provider: &'a str,
    pub id: &'a str,
    pub entry: &'a AiModelEntry,
}

/// Immutable view of every loaded price document.
#[derive(Debug, Clone)]
pub struct PriceCatalog {
    ai: BTreeMap<String, AiModelsDocument>,
    cloud: BTreeMap<String, CloudDocument>,
    saas: SaasDocument,
    sources: Vec<CatalogSourceInfo>,
}

impl PriceCatalog {
    /// Assemble a catalog. Later documents for the same provider replace
    /// earlier ones; SaaS services are merged by name.
    pub fn from_documents(
        documents: impl IntoIterator<Item = (CatalogSourceInfo, CatalogDocument)>,
    ) -> Self {
        let mut catalog = Self {
            ai: BTreeMap::new(),
            cloud: BTreeMap::new(),
            saas: SaasDocument {
                updated_at: None,
                services: BTreeMap::new(),
            },
            sources: Vec::new(),
        };

        for (info, document) in documents {
            match document {
                CatalogDocument::AiModels(doc) => {
                    catalog.ai.insert(doc.provider.to_ascii_lowercase(), doc);
                }
                CatalogDocument::Cloud(doc) => {
                    catalog.cloud.insert(doc.provider.to_ascii_lowercase(), doc);
                }
                CatalogDocument::Saas(doc) => {
                    catalog.saas.updated_at = catalog.saas.updated_at.max(doc.updated_at);
                    catalog.saas.services.extend(doc.services);
                }
            }
            catalog.sources.push(info);
        }
        catalog
    }

    /// The catalog built only from the embedded documents.
    pub fn embedded() -> Result<Self, CatalogError> {
        let documents = CATALOG_FILES
            .iter()
            .map(|file| {
                let doc = file.parse_embedded()?;
                Ok((source_info(file, CatalogOrigin::Embedded, &doc), doc))
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;
        Ok(Self::from_documents(documents))
    }

    /// Load every catalog file from `dir`, substituting the embedded copy for
    /// any file that is missing, unreadable or malformed.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut documents = Vec::with_capacity(CATALOG_FILES.len());
        for file in &CATALOG_FILES {
            let path = dir.join(file.file_name);
            let loaded = match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<CatalogDocument>(&contents) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Catalog file is malformed, using embedded prices"
                        );
                        None
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Catalog file not found, using embedded prices");
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read catalog file, using embedded prices"
                    );
                    None
                }
            };

            let (origin, doc) = match loaded {
                Some(doc) => (CatalogOrigin::File, doc),
                None => (CatalogOrigin::Embedded, file.parse_embedded()?),
            };
            documents.push((source_info(file, origin, &doc), doc));
        }
        Ok(Self::from_documents(documents))
    }

    // ── AI models ───────────────────────────────────────────────────────────

    pub fn ai_providers(&self) -> Vec<&str> {
        self.ai.keys().map(String::as_str).collect()
    }

    pub fn ai_provider(&self, provider: &str) -> Option<&AiModelsDocument> {
        self.ai.get(&provider.to_ascii_lowercase())
    }

    /// Resolve a model reference: exact ID, then exact alias, then either one
    /// compared case-insensitively. Returns the canonical ID.
    pub fn resolve_model(&self, provider: &str, model: &str) -> Option<(&str, &AiModelEntry)> {
        let doc = self.ai_provider(provider)?;
        let model = model.trim();

        if let Some((id, entry)) = doc.models.get_key_value(model) {
            return Some((id.as_str(), entry));
        }
        let by_alias = |ignore_case: bool| {
            doc.models
                .iter()
                .find(|(_, entry)| {
                    entry.aliases.iter().any(|alias| {
                        if ignore_case {
                            alias.eq_ignore_ascii_case(model)
                        } else {
                            alias == model
                        }
                    })
                })
                .map(|(id, entry)| (id.as_str(), entry))
        };
        if let Some(found) = by_alias(false) {
            return Some(found);
        }
        if let Some((id, entry)) = doc
            .models
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(model))
        {
            return Some((id.as_str(), entry));
        }
        by_alias(true)
    }

    /// Every model of every provider, ordered by provider then ID.
    pub fn models(&self) -> impl Iterator<Item = ModelRef<'_>> {
        self.ai.iter().flat_map(|(provider, doc)| {
            doc.models.iter().map(move |(id, entry)| ModelRef {
                provider: provider.as_str(),
                id: id.as_str(),
                entry,
            })
        })
    }

    pub fn provider_models(&self, provider: &str) -> impl Iterator<Item = ModelRef<'_>> {
        let provider = provider.to_ascii_lowercase();
        self.models().filter(move |m| m.provider == provider)
    }

    // ── Cloud ───────────────────────────────────────────────────────────────

    pub fn cloud_providers(&self) -> Vec<&str> {
        self.cloud.keys().map(String::as_str).collect()
    }

    pub fn cloud(&self, provider: &str) -> Option<&CloudDocument> {
        self.cloud.get(&provider.to_ascii_lowercase())
    }

    pub fn cloud_documents(&self) -> impl Iterator<Item = (&str, &CloudDocument)> {
        self.cloud.iter().map(|(name, doc)| (name.as_str(), doc))
    }

    // ── SaaS ────────────────────────────────────────────────────────────────

    pub fn saas(&self) -> &SaasDocument {
        &self.saas
    }

    pub fn sources(&self) -> &[CatalogSourceInfo] {
        &self.sources
    }

    pub fn model_count(&self) -> usize {
        self.ai.values().map(|d| d.models.len()).sum()
    }

    pub fn instance_count(&self) -> usize {
        self.cloud.values().map(|d| d.instances.len()).sum()
    }

    pub fn service_count(&self) -> usize {
        self.saas.services.len()
    }
}

fn source_info(file: &CatalogFile, origin: CatalogOrigin, doc: &CatalogDocument) -> CatalogSourceInfo {
    CatalogSourceInfo {
        source: file.source.to_string(),
        origin,
        updated_at: doc.updated_at(),
    }
}

/// Shared handle to the current catalog snapshot.
#[derive(Clone)]
pub struct CatalogRegistry {
    inner: Arc<RwLock<Arc<PriceCatalog>>>,
    data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for CatalogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRegistry")
            .field("data_dir", &self.data_dir)
            .field("models", &self.inner.read().model_count())
            .finish()
    }
}

impl CatalogRegistry {
    pub fn new(catalog: PriceCatalog, data_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
            data_dir,
        }
    }

    pub fn embedded() -> Result<Self, CatalogError> {
        Ok(Self::new(PriceCatalog::embedded()?, None))
    }

    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.into();
        let catalog = PriceCatalog::load_from_dir(&data_dir)?;
        Ok(Self::new(catalog, Some(data_dir)))
    }

    /// The current catalog. Holding the snapshot does not block reloads.
    pub fn snapshot(&self) -> Arc<PriceCatalog> {
        Arc::clone(&self.inner.read())
    }

    /// Swap in a new catalog wholesale.
    pub fn replace(&self, catalog: PriceCatalog) {
        *self.inner.write() = Arc::new(catalog);
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Re-read the data directory (or the embedded documents when none is
    /// configured) and swap the result in.
    pub fn reload(&self) -> Result<(), CatalogError> {
        let catalog = match &self.data_dir {
            Some(dir) => PriceCatalog::load_from_dir(dir)?,
            None => PriceCatalog::embedded()?,
        };
        tracing::info!(
            models = catalog.model_count(),
            instances = catalog.instance_count(),
            services = catalog.service_count(),
            "Price catalog reloaded"
        );
        self.replace(catalog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_embedded_catalog_counts() {
        let catalog = PriceCatalog::embedded().unwrap();
        assert_eq!(catalog.ai_providers(), vec!["anthropic", "openai", "openrouter"]);
        assert_eq!(catalog.cloud_providers(), vec!["aws", "azure", "gcp"]);
        assert!(catalog.model_count() >= 20);
        assert_eq!(catalog.service_count(), 5);
        assert!(
            catalog
                .sources()
                .iter()
                .all(|s| s.origin == CatalogOrigin::Embedded)
        );
    }

    #[rstest]
    #[case("openai", "gpt-4o", "gpt-4o")]
    #[case("openai", "gpt4o", "gpt-4o")]
    #[case("openai", "GPT-4O-MINI", "gpt-4o-mini")]
    #[case("anthropic", "sonnet", "claude-sonnet-4-20250514")]
    #[case("anthropic", "Claude-Opus", "claude-opus-4-1-20250805")]
    #[case("OpenAI", "o3", "o3")]
    fn test_resolve_model(#[case] provider: &str, #[case] model: &str, #[case] expected: &str) {
        let catalog = PriceCatalog::embedded().unwrap();
        let (id, _) = catalog.resolve_model(provider, model).unwrap();
        assert_eq!(id, expected);
    }

    #[test]
    fn test_resolve_unknown_model() {
        let catalog = PriceCatalog::embedded().unwrap();
        assert!(catalog.resolve_model("openai", "gpt-9").is_none());
        assert!(catalog.resolve_model("mistral", "large").is_none());
    }

    #[test]
    fn test_load_from_dir_falls_back_per_file() {
        let dir = TempDir::new().unwrap();
        let mut aws: serde_json::Value = serde_json::from_str(super::super::EMBEDDED_AWS).unwrap();
        aws["instances"]["m5.large"]["hourly"] = serde_json::json!(0.5);
        std::fs::write(dir.path().join("aws.json"), aws.to_string()).unwrap();
        std::fs::write(dir.path().join("gcp.json"), "{ not json").unwrap();

        let catalog = PriceCatalog::load_from_dir(dir.path()).unwrap();
        let (_, m5) = catalog.cloud("aws").unwrap().find_instance("m5.large").unwrap();
        assert_eq!(m5.hourly, 0.5);
        assert!(catalog.cloud("gcp").is_some());

        let origin = |name: &str| {
            catalog
                .sources()
                .iter()
                .find(|s| s.source == name)
                .unwrap()
                .origin
        };
        assert_eq!(origin("aws"), CatalogOrigin::File);
        assert_eq!(origin("gcp"), CatalogOrigin::Embedded);
        assert_eq!(origin("openai"), CatalogOrigin::Embedded);
    }

    #[test]
    fn test_registry_reload_swaps_snapshot() {
        let dir = TempDir::new().unwrap();
        let registry = CatalogRegistry::load(dir.path()).unwrap();
        let before = registry.snapshot();

        let mut openai: serde_json::Value =
            serde_json::from_str(super::super::EMBEDDED_OPENAI).unwrap();
        openai["models"]["gpt-4o"]["input_per_million"] = serde_json::json!(1.0);
        std::fs::write(dir.path().join("openai.json"), openai.to_string()).unwrap();

        registry.reload().unwrap();
        let after = registry.snapshot();

        assert_eq!(before.resolve_model("openai", "gpt-4o").unwrap().1.input_per_million, 2.5);
        assert_eq!(after.resolve_model("openai", "gpt-4o").unwrap().1.input_per_million, 1.0);
    }
}
