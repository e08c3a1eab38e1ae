//! Price catalog: AI model rates, cloud instance rates and SaaS plans.
//!
//! One JSON document per source lives in the configured data directory. Every
//! document is also embedded at build time, so a missing or unreadable file
//! falls back to the shipped prices rather than failing startup.
//!
//! # Usage
//!
//! ```rust,ignore
//! use costwise::catalog::CatalogRegistry;
//!
//! let registry = CatalogRegistry::load("./data")?;
//! let catalog = registry.snapshot();
//! if let Some((id, model)) = catalog.resolve_model("openai", "gpt4o") {
//!     println!("{id}: ${}/1M input", model.input_per_million);
//! }
//! ```

mod registry;
mod types;

pub use registry::{
    CatalogError, CatalogOrigin, CatalogRegistry, CatalogSourceInfo, ModelRef, PriceCatalog,
};
pub use types::{
    AiModelEntry, AiModelsDocument, CatalogDocument, CloudDocument, InstanceEntry, InstanceFamily,
    Latency, PlanLimit, ReservedDiscounts, SaasDocument, SaasPlan, SaasService,
};

pub const EMBEDDED_OPENAI: &str = include_str!("../../data/openai.json");
pub const EMBEDDED_ANTHROPIC: &str = include_str!("../../data/anthropic.json");
pub const EMBEDDED_OPENROUTER: &str = include_str!("../../data/openrouter.json");
pub const EMBEDDED_AWS: &str = include_str!("../../data/aws.json");
pub const EMBEDDED_GCP: &str = include_str!("../../data/gcp.json");
pub const EMBEDDED_AZURE: &str = include_str!("../../data/azure.json");
pub const EMBEDDED_SAAS: &str = include_str!("../../data/saas.json");

/// A catalog file and its embedded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogFile {
    /// Source name, also the update-report key
    pub source: &'static str,
    pub file_name: &'static str,
    pub embedded: &'static str,
}

impl CatalogFile {
    pub fn parse_embedded(&self) -> Result<CatalogDocument, CatalogError> {
        serde_json::from_str(self.embedded).map_err(|e| CatalogError::Parse {
            file: self.file_name.to_string(),
            source: e,
        })
    }
}

pub const CATALOG_FILES: [CatalogFile; 7] = [
    CatalogFile {
        source: "openai",
        file_name: "openai.json",
        embedded: EMBEDDED_OPENAI,
    },
    CatalogFile {
        source: "anthropic",
        file_name: "anthropic.json",
        embedded: EMBEDDED_ANTHROPIC,
    },
    CatalogFile {
        source: "openrouter",
        file_name: "openrouter.json",
        embedded: EMBEDDED_OPENROUTER,
    },
    CatalogFile {
        source: "aws",
        file_name: "aws.json",
        embedded: EMBEDDED_AWS,
    },
    CatalogFile {
        source: "gcp",
        file_name: "gcp.json",
        embedded: EMBEDDED_GCP,
    },
    CatalogFile {
        source: "azure",
        file_name: "azure.json",
        embedded: EMBEDDED_AZURE,
    },
    CatalogFile {
        source: "saas",
        file_name: "saas.json",
        embedded: EMBEDDED_SAAS,
    },
];

/// Look up a catalog file by source name.
pub fn catalog_file(source: &str) -> Option<&'static CatalogFile> {
    CATALOG_FILES.iter().find(|f| f.source == source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_documents_parse() {
        for file in &CATALOG_FILES {
            let doc = file
                .parse_embedded()
                .unwrap_or_else(|e| panic!("{} should parse: {e}", file.file_name));
            assert!(doc.updated_at().is_some(), "{} has no updated_at", file.file_name);
        }
    }

    #[test]
    fn test_embedded_documents_have_expected_kinds() {
        for file in &CATALOG_FILES {
            let expected = match file.source {
                "openai" | "anthropic" | "openrouter" => "ai_models",
                "aws" | "gcp" | "azure" => "cloud",
                _ => "saas",
            };
            assert_eq!(file.parse_embedded().unwrap().kind(), expected);
        }
    }

    #[test]
    fn test_embedded_bandwidth_tiers_are_ordered() {
        for file in &CATALOG_FILES {
            if let CatalogDocument::Cloud(doc) = file.parse_embedded().unwrap() {
                assert_eq!(
                    crate::formulas::first_misordered_tier(&doc.bandwidth_tiers),
                    None,
                    "{} tiers out of order",
                    file.source
                );
            }
        }
    }

    #[test]
    fn test_catalog_file_lookup() {
        assert_eq!(catalog_file("azure").unwrap().file_name, "azure.json");
        assert!(catalog_file("oracle").is_none());
    }
}
