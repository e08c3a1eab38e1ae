//! Cloud compute, reserved-instance and storage pricing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ResolveError, default_hours_per_month, owned};
use crate::{
    catalog::{CloudDocument, InstanceEntry, InstanceFamily, PriceCatalog},
    formulas::{ReservedSavings, compute_cost, reserved_savings, round2, round4},
    insights::{self, Insight, InsightKind},
};

fn default_count() -> u32 {
    1
}

fn default_storage_class() -> String {
    "standard".to_string()
}

fn cloud<'a>(catalog: &'a PriceCatalog, provider: &str) -> Result<&'a CloudDocument, ResolveError> {
    catalog
        .cloud(provider)
        .ok_or_else(|| ResolveError::UnknownProvider {
            provider: provider.to_string(),
            known: owned(catalog.cloud_providers()),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Instance identifier parsing
// ─────────────────────────────────────────────────────────────────────────────

/// How an instance identifier was matched to a catalog key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// `family.size`, e.g. `m5.large`
    DotSeparated,
    /// `family-size`, e.g. `e2-standard-2`, or `m5-large` read as `m5.large`
    DashSeparated,
    /// Bare SKU, e.g. `Standard_D2s_v3`, or `D2s_v3` read with the `Standard_` prefix
    BareSku,
}

const SKU_PREFIX: &str = "standard_";

/// Candidate catalog keys for an identifier, in the order they are tried.
fn candidate_keys(id: &str) -> Vec<(ParseStrategy, String)> {
    let mut candidates = Vec::new();

    if let Some((family, size)) = id.split_once('.')
        && !family.is_empty()
        && !size.is_empty()
    {
        candidates.push((ParseStrategy::DotSeparated, id.to_string()));
    }

    if let Some((family, size)) = id.split_once('-')
        && !family.is_empty()
        && !size.is_empty()
    {
        candidates.push((ParseStrategy::DashSeparated, id.to_string()));
        candidates.push((ParseStrategy::DashSeparated, format!("{family}.{size}")));
    }

    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        candidates.push((ParseStrategy::BareSku, id.to_string()));
        if !id.to_ascii_lowercase().starts_with(SKU_PREFIX) {
            candidates.push((ParseStrategy::BareSku, format!("{SKU_PREFIX}{id}")));
        }
    }

    candidates
}

/// Resolve an instance identifier against a provider document. The first
/// strategy that yields a catalog key wins; matching is case-insensitive.
pub fn resolve_instance<'a>(
    document: &'a CloudDocument,
    id: &str,
) -> Option<(ParseStrategy, &'a str, &'a InstanceEntry)> {
    candidate_keys(id.trim())
        .into_iter()
        .find_map(|(strategy, key)| {
            document
                .find_instance(&key)
                .map(|(canonical, entry)| (strategy, canonical, entry))
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// estimate_compute_cost
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ComputeCostRequest {
    /// Cloud provider ("aws", "gcp", "azure")
    #[validate(length(min = 1, max = 64))]
    pub provider: String,

    /// Instance type, e.g. "m5.large", "e2-standard-2", "Standard_D2s_v3"
    #[validate(length(min = 1, max = 128))]
    pub instance_type: String,

    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 10000))]
    pub count: u32,

    #[serde(default = "default_hours_per_month")]
    #[validate(range(min = 0.0, max = 744.0))]
    pub hours_per_month: f64,

    /// Average utilization as a fraction (0.0–1.0)
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub utilization: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservedOptions {
    pub one_year: ReservedSavings,
    pub three_year: ReservedSavings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputeCostEstimate {
    pub provider: String,
    pub instance_type: String,
    pub matched_strategy: ParseStrategy,
    pub vcpu: u32,
    pub memory_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<InstanceFamily>,
    pub count: u32,
    pub hours_per_month: f64,
    pub hourly: f64,
    pub monthly: f64,
    pub yearly: f64,
    pub reserved: ReservedOptions,
    pub insights: Vec<Insight>,
}

pub fn estimate_compute_cost(
    catalog: &PriceCatalog,
    request: &ComputeCostRequest,
) -> Result<ComputeCostEstimate, ResolveError> {
    let document = cloud(catalog, &request.provider)?;
    let Some((strategy, key, entry)) = resolve_instance(document, &request.instance_type) else {
        return Err(ResolveError::UnknownInstance {
            provider: request.provider.clone(),
            instance: request.instance_type.clone(),
            known: document.instances.keys().cloned().collect(),
        });
    };

    let cost = compute_cost(entry.hourly, request.hours_per_month, request.count);
    let reserved = ReservedOptions {
        one_year: reserved_savings(cost.monthly, document.reserved_discounts.one_year),
        three_year: reserved_savings(cost.monthly, document.reserved_discounts.three_year),
    };

    let mut insights = Vec::new();
    insights.extend(insights::low_utilization(cost.monthly, request.utilization));
    insights.extend(insights::reserved_opportunity(
        request.hours_per_month,
        reserved.one_year.monthly_savings,
    ));

    Ok(ComputeCostEstimate {
        provider: document.provider.clone(),
        instance_type: key.to_string(),
        matched_strategy: strategy,
        vcpu: entry.vcpu,
        memory_gb: entry.memory_gb,
        family: entry.family,
        count: request.count,
        hours_per_month: request.hours_per_month,
        hourly: cost.hourly,
        monthly: cost.monthly,
        yearly: cost.yearly,
        reserved,
        insights,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// calculate_reserved_savings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReservedSavingsRequest {
    /// On-demand monthly spend in USD
    #[validate(range(min = 0.0))]
    pub monthly_on_demand: f64,

    /// Provider whose published discounts apply; optional when both overrides are given
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub one_year_discount: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub three_year_discount: Option<f64>,

    #[serde(default = "default_hours_per_month")]
    #[validate(range(min = 0.0, max = 744.0))]
    pub hours_per_month: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservedSavingsEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub monthly_on_demand: f64,
    pub one_year: ReservedSavings,
    pub three_year: ReservedSavings,
    /// Total savings of the three-year term over three years of one-year terms
    pub three_year_extra_savings: f64,
    pub insights: Vec<Insight>,
}

pub fn calculate_reserved_savings(
    catalog: &PriceCatalog,
    request: &ReservedSavingsRequest,
) -> Result<ReservedSavingsEstimate, ResolveError> {
    let published = match &request.provider {
        Some(provider) => Some(cloud(catalog, provider)?.reserved_discounts),
        None => None,
    };

    let one_year = request
        .one_year_discount
        .or(published.map(|d| d.one_year))
        .ok_or_else(|| {
            ResolveError::invalid("one_year_discount", "required when no provider is given")
        })?;
    let three_year = request
        .three_year_discount
        .or(published.map(|d| d.three_year))
        .ok_or_else(|| {
            ResolveError::invalid("three_year_discount", "required when no provider is given")
        })?;

    let one = reserved_savings(request.monthly_on_demand, one_year);
    let three = reserved_savings(request.monthly_on_demand, three_year);

    let insights = insights::reserved_opportunity(request.hours_per_month, one.monthly_savings)
        .into_iter()
        .collect();

    Ok(ReservedSavingsEstimate {
        provider: request.provider.clone(),
        monthly_on_demand: request.monthly_on_demand,
        three_year_extra_savings: round2((three.monthly_savings - one.monthly_savings) * 36.0),
        one_year: one,
        three_year: three,
        insights,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// compare_compute_providers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompareComputeRequest {
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 512))]
    pub min_vcpu: u32,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 4096.0))]
    pub min_memory_gb: f64,

    /// Restrict to these providers (all when empty)
    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    pub family: Option<InstanceFamily>,

    #[serde(default = "default_hours_per_month")]
    #[validate(range(min = 0.0, max = 744.0))]
    pub hours_per_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderOption {
    pub provider: String,
    pub instance_type: String,
    pub vcpu: u32,
    pub memory_gb: f64,
    pub hourly: f64,
    pub monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputeComparison {
    /// Cheapest qualifying instance per provider, ascending by monthly cost
    pub options: Vec<ProviderOption>,
    /// Providers with no instance meeting the minimums
    pub unmatched_providers: Vec<String>,
    pub insights: Vec<Insight>,
}

pub fn compare_compute_providers(
    catalog: &PriceCatalog,
    request: &CompareComputeRequest,
) -> Result<ComputeComparison, ResolveError> {
    for provider in &request.providers {
        cloud(catalog, provider)?;
    }

    let mut options = Vec::new();
    let mut unmatched_providers = Vec::new();
    for (name, document) in catalog.cloud_documents() {
        if !request.providers.is_empty()
            && !request.providers.iter().any(|p| p.eq_ignore_ascii_case(name))
        {
            continue;
        }
        let cheapest = document
            .instances
            .iter()
            .filter(|(_, i)| i.vcpu >= request.min_vcpu && i.memory_gb >= request.min_memory_gb)
            .filter(|(_, i)| request.family.is_none() || i.family == request.family)
            .min_by(|a, b| a.1.hourly.total_cmp(&b.1.hourly).then(a.0.cmp(b.0)));

        match cheapest {
            Some((key, instance)) => {
                let cost = compute_cost(instance.hourly, request.hours_per_month, 1);
                options.push(ProviderOption {
                    provider: document.provider.clone(),
                    instance_type: key.clone(),
                    vcpu: instance.vcpu,
                    memory_gb: instance.memory_gb,
                    hourly: round4(instance.hourly),
                    monthly: cost.monthly,
                });
            }
            None => unmatched_providers.push(document.provider.clone()),
        }
    }
    options.sort_by(|a, b| a.monthly.total_cmp(&b.monthly).then(a.provider.cmp(&b.provider)));

    let mut insights = Vec::new();
    if let (Some(cheapest), Some(priciest)) = (options.first(), options.last())
        && priciest.monthly > cheapest.monthly
    {
        let difference = priciest.monthly - cheapest.monthly;
        insights.push(
            Insight::new(
                InsightKind::Opportunity,
                format!(
                    "{} {} is ${difference:.2}/month cheaper than {} {}.",
                    cheapest.provider, cheapest.instance_type, priciest.provider, priciest.instance_type
                ),
            )
            .with_impact(difference),
        );
    }

    Ok(ComputeComparison {
        options,
        unmatched_providers,
        insights,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// estimate_storage_cost
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StorageCostRequest {
    #[validate(length(min = 1, max = 64))]
    pub provider: String,

    /// Storage class, e.g. "standard", "infrequent", "archive", "hot"
    #[serde(default = "default_storage_class")]
    #[validate(length(min = 1, max = 64))]
    pub storage_class: String,

    #[validate(range(min = 0.0))]
    pub size_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageCostEstimate {
    pub provider: String,
    pub storage_class: String,
    pub size_gb: f64,
    pub per_gb_month: f64,
    pub monthly_cost: f64,
    pub yearly_cost: f64,
}

pub fn estimate_storage_cost(
    catalog: &PriceCatalog,
    request: &StorageCostRequest,
) -> Result<StorageCostEstimate, ResolveError> {
    let document = cloud(catalog, &request.provider)?;
    let Some((class, rate)) = document
        .storage
        .iter()
        .find(|(class, _)| class.eq_ignore_ascii_case(request.storage_class.trim()))
    else {
        return Err(ResolveError::UnknownStorageClass {
            provider: request.provider.clone(),
            class: request.storage_class.clone(),
            known: document.storage.keys().cloned().collect(),
        });
    };

    let monthly = request.size_gb * rate;
    Ok(StorageCostEstimate {
        provider: document.provider.clone(),
        storage_class: class.clone(),
        size_gb: request.size_gb,
        per_gb_month: *rate,
        monthly_cost: round2(monthly),
        yearly_cost: round2(monthly * 12.0),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn catalog() -> PriceCatalog {
        PriceCatalog::embedded().unwrap()
    }

    fn compute(provider: &str, instance: &str) -> ComputeCostRequest {
        ComputeCostRequest {
            provider: provider.to_string(),
            instance_type: instance.to_string(),
            count: 1,
            hours_per_month: 730.0,
            utilization: None,
        }
    }

    #[rstest]
    #[case("aws", "m5.large", ParseStrategy::DotSeparated, "m5.large")]
    #[case("aws", "M5.LARGE", ParseStrategy::DotSeparated, "m5.large")]
    #[case("aws", "m5-large", ParseStrategy::DashSeparated, "m5.large")]
    #[case("gcp", "e2-standard-2", ParseStrategy::DashSeparated, "e2-standard-2")]
    #[case("azure", "Standard_D2s_v3", ParseStrategy::BareSku, "Standard_D2s_v3")]
    #[case("azure", "d2s_v3", ParseStrategy::BareSku, "Standard_D2s_v3")]
    fn test_instance_strategies(
        #[case] provider: &str,
        #[case] instance: &str,
        #[case] strategy: ParseStrategy,
        #[case] canonical: &str,
    ) {
        let estimate = estimate_compute_cost(&catalog(), &compute(provider, instance)).unwrap();
        assert_eq!(estimate.matched_strategy, strategy);
        assert_eq!(estimate.instance_type, canonical);
    }

    #[test]
    fn test_unknown_instance() {
        let err = estimate_compute_cost(&catalog(), &compute("aws", "z9.huge")).unwrap_err();
        let ResolveError::UnknownInstance { known, .. } = err else {
            panic!("expected UnknownInstance");
        };
        assert!(known.contains(&"m5.large".to_string()));
    }

    #[test]
    fn test_unknown_provider() {
        let err = estimate_compute_cost(&catalog(), &compute("oracle", "m5.large")).unwrap_err();
        assert_eq!(err.code(), "unknown_provider");
        assert_eq!(err.valid_values().unwrap().len(), 3);
    }

    #[test]
    fn test_m5_large_monthly_with_reserved() {
        let estimate = estimate_compute_cost(&catalog(), &compute("aws", "m5.large")).unwrap();
        assert_eq!(estimate.monthly, 70.08);
        assert_eq!(estimate.reserved.one_year.discount, 0.35);
        assert!(estimate.reserved.three_year.monthly_savings > estimate.reserved.one_year.monthly_savings);
        assert!(
            estimate
                .insights
                .iter()
                .any(|i| i.kind == InsightKind::Opportunity)
        );
    }

    #[test]
    fn test_low_utilization_warning() {
        let mut request = compute("aws", "m5.large");
        request.utilization = Some(0.1);
        request.hours_per_month = 200.0;
        let estimate = estimate_compute_cost(&catalog(), &request).unwrap();
        assert_eq!(estimate.insights.len(), 1);
        assert_eq!(estimate.insights[0].kind, InsightKind::Warning);
    }

    #[test]
    fn test_reserved_savings_with_overrides() {
        let estimate = calculate_reserved_savings(
            &catalog(),
            &ReservedSavingsRequest {
                monthly_on_demand: 500.0,
                provider: None,
                one_year_discount: Some(0.35),
                three_year_discount: Some(0.55),
                hours_per_month: 730.0,
            },
        )
        .unwrap();
        assert_eq!(estimate.one_year.reserved_monthly, 325.0);
        assert_eq!(estimate.one_year.monthly_savings, 175.0);
        assert_eq!(estimate.one_year.yearly_savings, 2100.0);
        assert_eq!(estimate.three_year.monthly_savings, 275.0);
    }

    #[test]
    fn test_reserved_savings_requires_discounts() {
        let err = calculate_reserved_savings(
            &catalog(),
            &ReservedSavingsRequest {
                monthly_on_demand: 500.0,
                provider: None,
                one_year_discount: None,
                three_year_discount: Some(0.5),
                hours_per_month: 730.0,
            },
        )
        .unwrap_err();
        assert_eq!(err.field(), "one_year_discount");
    }

    #[test]
    fn test_compare_compute_providers() {
        let comparison = compare_compute_providers(
            &catalog(),
            &CompareComputeRequest {
                min_vcpu: 4,
                min_memory_gb: 16.0,
                providers: vec![],
                family: None,
                hours_per_month: 730.0,
            },
        )
        .unwrap();
        assert_eq!(comparison.options.len(), 3);
        assert!(
            comparison
                .options
                .windows(2)
                .all(|w| w[0].monthly <= w[1].monthly)
        );
        assert!(
            comparison
                .options
                .iter()
                .all(|o| o.vcpu >= 4 && o.memory_gb >= 16.0)
        );
    }

    #[test]
    fn test_compare_reports_unmatched() {
        let comparison = compare_compute_providers(
            &catalog(),
            &CompareComputeRequest {
                min_vcpu: 1,
                min_memory_gb: 10_000.0,
                providers: vec!["aws".into()],
                family: None,
                hours_per_month: 730.0,
            },
        )
        .unwrap();
        assert!(comparison.options.is_empty());
        assert_eq!(comparison.unmatched_providers, vec!["aws"]);
    }

    #[test]
    fn test_storage_cost() {
        let estimate = estimate_storage_cost(
            &catalog(),
            &StorageCostRequest {
                provider: "aws".into(),
                storage_class: "standard".into(),
                size_gb: 1000.0,
            },
        )
        .unwrap();
        assert_eq!(estimate.monthly_cost, 23.0);
        assert_eq!(estimate.yearly_cost, 276.0);
    }

    #[test]
    fn test_unknown_storage_class() {
        let err = estimate_storage_cost(
            &catalog(),
            &StorageCostRequest {
                provider: "azure".into(),
                storage_class: "glacier".into(),
                size_gb: 1.0,
            },
        )
        .unwrap_err();
        let ResolveError::UnknownStorageClass { known, .. } = err else {
            panic!("expected UnknownStorageClass");
        };
        assert_eq!(known, vec!["archive", "cool", "hot"]);
    }
}
