//! Type definitions for the price catalog documents.
//!
//! Each catalog file holds one document tagged by `kind`. SaaS documents are
//! accepted in several source layouts and normalized on load, so everything
//! past deserialization sees a single shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{classifier::TaskCategory, formulas::BandwidthTier};

/// One catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogDocument {
    AiModels(AiModelsDocument),
    Cloud(CloudDocument),
    Saas(SaasDocument),
}

impl CatalogDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AiModels(_) => "ai_models",
            Self::Cloud(_) => "cloud",
            Self::Saas(_) => "saas",
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::AiModels(doc) => doc.updated_at,
            Self::Cloud(doc) => doc.updated_at,
            Self::Saas(doc) => doc.updated_at,
        }
    }

    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        match self {
            Self::AiModels(doc) => doc.updated_at = Some(at),
            Self::Cloud(doc) => doc.updated_at = Some(at),
            Self::Saas(doc) => doc.updated_at = Some(at),
        }
    }

    /// Flatten the document into comparable items keyed by a stable path.
    ///
    /// Two documents differ by exactly the items whose values differ or that
    /// exist in only one of them. `updated_at` is not an item.
    pub fn items(&self) -> BTreeMap<String, serde_json::Value> {
        fn value<T: Serialize>(v: &T) -> serde_json::Value {
            serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
        }

        let mut items = BTreeMap::new();
        match self {
            Self::AiModels(doc) => {
                for (id, model) in &doc.models {
                    items.insert(format!("models/{id}"), value(model));
                }
            }
            Self::Cloud(doc) => {
                for (id, instance) in &doc.instances {
                    items.insert(format!("instances/{id}"), value(instance));
                }
                for (class, rate) in &doc.storage {
                    items.insert(format!("storage/{class}"), value(rate));
                }
                items.insert("bandwidth_tiers".to_string(), value(&doc.bandwidth_tiers));
                items.insert(
                    "reserved_discounts".to_string(),
                    value(&doc.reserved_discounts),
                );
            }
            Self::Saas(doc) => {
                for (name, service) in &doc.services {
                    items.insert(format!("services/{name}"), value(service));
                }
            }
        }
        items
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AI models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModelsDocument {
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Model ID → pricing entry
    pub models: BTreeMap<String, AiModelEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Latency {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModelEntry {
    pub display_name: String,

    /// Input token cost ($/1M tokens)
    pub input_per_million: f64,

    /// Output token cost ($/1M tokens)
    pub output_per_million: f64,

    /// Primary task category
    pub category: TaskCategory,

    /// Categories the model is a good fit for, used by recommendations
    #[serde(default)]
    pub best_for: Vec<TaskCategory>,

    pub latency: Latency,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,

    /// Alternate identifiers accepted on lookup (dated snapshots, short names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cloud
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDocument {
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Instance ID → on-demand rate and shape
    pub instances: BTreeMap<String, InstanceEntry>,

    /// Storage class → $/GB-month
    #[serde(default)]
    pub storage: BTreeMap<String, f64>,

    /// Egress price list, ascending cumulative bounds
    #[serde(default)]
    pub bandwidth_tiers: Vec<BandwidthTier>,

    pub reserved_discounts: ReservedDiscounts,
}

impl CloudDocument {
    /// Case-insensitive instance lookup returning the canonical key.
    pub fn find_instance(&self, id: &str) -> Option<(&str, &InstanceEntry)> {
        if let Some((key, entry)) = self.instances.get_key_value(id) {
            return Some((key.as_str(), entry));
        }
        self.instances
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntry {
    /// On-demand $/hour
    pub hourly: f64,
    pub vcpu: u32,
    pub memory_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<InstanceFamily>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstanceFamily {
    Burstable,
    GeneralPurpose,
    ComputeOptimized,
    MemoryOptimized,
    Gpu,
}

/// Committed-use discount fractions (0.35 = 35 % off on-demand).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservedDiscounts {
    pub one_year: f64,
    pub three_year: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// SaaS
// ─────────────────────────────────────────────────────────────────────────────

/// A plan limit: a finite quota or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLimit", into = "RawLimit")]
pub enum PlanLimit {
    Finite(f64),
    Unlimited,
}

impl PlanLimit {
    pub fn covers(&self, usage: f64) -> bool {
        match self {
            Self::Finite(limit) => usage <= *limit,
            Self::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Number(f64),
    Text(String),
}

impl TryFrom<RawLimit> for PlanLimit {
    type Error = String;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Number(n) if n.is_finite() && n >= 0.0 => Ok(Self::Finite(n)),
            RawLimit::Number(n) => Err(format!("invalid plan limit {n}")),
            RawLimit::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            RawLimit::Text(s) => Err(format!("invalid plan limit '{s}'")),
        }
    }
}

impl From<PlanLimit> for RawLimit {
    fn from(limit: PlanLimit) -> Self {
        match limit {
            PlanLimit::Finite(n) => Self::Number(n),
            PlanLimit::Unlimited => Self::Text("unlimited".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasPlan {
    pub name: String,
    pub monthly_price: f64,
    /// Usage dimension → limit. A dimension absent here is not offered by the plan.
    #[serde(default)]
    pub limits: BTreeMap<String, PlanLimit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasService {
    pub category: String,
    /// Plans in ascending price order.
    pub plans: Vec<SaasPlan>,
}

impl SaasService {
    /// Every usage dimension any plan of this service declares.
    pub fn dimensions(&self) -> Vec<&str> {
        let mut dims: Vec<&str> = self
            .plans
            .iter()
            .flat_map(|p| p.limits.keys().map(String::as_str))
            .collect();
        dims.sort_unstable();
        dims.dedup();
        dims
    }
}

/// SaaS plans, normalized. Serializes in the normalized shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSaasDocument")]
pub struct SaasDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub services: BTreeMap<String, SaasService>,
}

/// Category used for services that declare none.
const UNCATEGORIZED: &str = "other";

#[derive(Debug, Deserialize)]
struct RawSaasDocument {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    services: BTreeMap<String, RawService>,
    /// Category for services whose entry is a bare plan list.
    #[serde(default)]
    categories: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawService {
    Bare(Vec<SaasPlan>),
    Described {
        #[serde(default)]
        category: Option<String>,
        plans: RawPlans,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPlans {
    List(Vec<SaasPlan>),
    Wrapped { plans: Vec<SaasPlan> },
}

impl From<RawSaasDocument> for SaasDocument {
    fn from(raw: RawSaasDocument) -> Self {
        let RawSaasDocument {
            updated_at,
            services,
            categories,
        } = raw;

        let services = services
            .into_iter()
            .map(|(name, service)| {
                let (category, mut plans) = match service {
                    RawService::Bare(plans) => (None, plans),
                    RawService::Described { category, plans } => match plans {
                        RawPlans::List(plans) | RawPlans::Wrapped { plans } => (category, plans),
                    },
                };
                let category = category
                    .or_else(|| categories.get(&name).cloned())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                plans.sort_by(|a, b| a.monthly_price.total_cmp(&b.monthly_price));
                (name, SaasService { category, plans })
            })
            .collect();

        Self {
            updated_at,
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::EMBEDDED_SAAS;

    #[test]
    fn test_saas_shapes_normalize() {
        let doc: CatalogDocument = serde_json::from_str(EMBEDDED_SAAS).unwrap();
        let CatalogDocument::Saas(saas) = doc else {
            panic!("expected saas document");
        };

        // {"plans": {"plans": [...]}}
        let clerk = &saas.services["clerk"];
        assert_eq!(clerk.category, "auth");
        assert_eq!(clerk.plans.len(), 3);

        // bare array, category from the side table
        let neon = &saas.services["neon"];
        assert_eq!(neon.category, "database");
        assert_eq!(neon.plans[0].name, "Free");

        // {"plans": [...]}
        assert_eq!(saas.services["vercel"].category, "hosting");
        assert_eq!(
            saas.services["vercel"].plans[2].limits["bandwidth_gb"],
            PlanLimit::Unlimited
        );
    }

    #[test]
    fn test_normalized_saas_round_trips() {
        let doc: CatalogDocument = serde_json::from_str(EMBEDDED_SAAS).unwrap();
        let written = serde_json::to_string(&doc).unwrap();
        let reread: CatalogDocument = serde_json::from_str(&written).unwrap();
        assert_eq!(doc, reread);
    }

    #[test]
    fn test_plan_limit_rejects_garbage() {
        let err = serde_json::from_value::<PlanLimit>(json!("lots"));
        assert!(err.is_err());
        let err = serde_json::from_value::<PlanLimit>(json!(-1));
        assert!(err.is_err());
        assert_eq!(
            serde_json::from_value::<PlanLimit>(json!("Unlimited")).unwrap(),
            PlanLimit::Unlimited
        );
    }

    #[test]
    fn test_items_ignore_updated_at() {
        let mut a: CatalogDocument =
            serde_json::from_str(crate::catalog::EMBEDDED_AWS).unwrap();
        let b = a.clone();
        a.set_updated_at(Utc::now());
        assert_eq!(a.items(), b.items());
        assert!(a.items().contains_key("instances/m5.large"));
        assert!(a.items().contains_key("bandwidth_tiers"));
    }

    #[test]
    fn test_find_instance_case_insensitive() {
        let CatalogDocument::Cloud(azure) =
            serde_json::from_str(crate::catalog::EMBEDDED_AZURE).unwrap()
        else {
            panic!("expected cloud document");
        };
        let (key, _) = azure.find_instance("standard_d2s_v3").unwrap();
        assert_eq!(key, "Standard_D2s_v3");
    }
}
