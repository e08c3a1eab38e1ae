//! SaaS plan matching.
//!
//! A plan qualifies when every supplied usage dimension is within its limit.
//! A plan that does not declare a limit for a dimension does not qualify for
//! it (missing limits fail closed).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ResolveError, not_blank};
use crate::{
    catalog::{PlanLimit, PriceCatalog, SaasPlan, SaasService},
    formulas::{Measure, round2},
    insights::{self, Insight},
};

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SaasTierRequest {
    /// Service key, e.g. "supabase", "vercel", "mongodb_atlas"
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub service: String,

    /// Usage per dimension, e.g. {"storage_gb": 20, "monthly_active_users": 5000}
    #[serde(default)]
    pub usage: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompareSaasRequest {
    /// Service category, e.g. "database", "auth", "hosting"
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub category: String,

    #[serde(default)]
    pub usage: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierRecommendation {
    pub service: String,
    pub category: String,
    pub plan: String,
    pub monthly_price: f64,
    pub yearly_price: f64,
    /// Set when no plan covers the usage and the largest plan was chosen
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exceeded_dimensions: Vec<String>,
    /// Fraction of each limit the usage consumes on the chosen plan
    pub utilization: BTreeMap<String, Measure>,
    /// Next plan up, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_plan: Option<String>,
    pub insights: Vec<Insight>,
}

fn covers(plan: &SaasPlan, dimension: &str, usage: f64) -> bool {
    plan.limits
        .get(dimension)
        .is_some_and(|limit| limit.covers(usage))
}

fn check_usage(usage: &BTreeMap<String, f64>) -> Result<(), ResolveError> {
    for (dimension, value) in usage {
        if !value.is_finite() || *value < 0.0 {
            return Err(ResolveError::invalid(
                format!("usage.{dimension}"),
                "must be a non-negative number",
            ));
        }
    }
    Ok(())
}

fn find_service<'a>(
    catalog: &'a PriceCatalog,
    service: &str,
) -> Result<(&'a str, &'a SaasService), ResolveError> {
    let services = &catalog.saas().services;
    let wanted = service.trim();
    services
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(name, service)| (name.as_str(), service))
        .ok_or_else(|| ResolveError::UnknownService {
            service: service.to_string(),
            known: services.keys().cloned().collect(),
        })
}

/// Match usage against one service's plans.
pub fn match_tier(
    name: &str,
    service: &SaasService,
    usage: &BTreeMap<String, f64>,
) -> Result<TierRecommendation, ResolveError> {
    check_usage(usage)?;

    let known = service.dimensions();
    if let Some(dimension) = usage.keys().find(|d| !known.contains(&d.as_str())) {
        return Err(ResolveError::UnknownDimension {
            service: name.to_string(),
            dimension: dimension.clone(),
            known: known.iter().map(|d| d.to_string()).collect(),
        });
    }

    // Plans are sorted by price at load time.
    let qualifying = service
        .plans
        .iter()
        .position(|plan| usage.iter().all(|(dim, value)| covers(plan, dim, *value)));

    let Some(largest_idx) = service.plans.len().checked_sub(1) else {
        return Err(ResolveError::UnknownService {
            service: name.to_string(),
            known: Vec::new(),
        });
    };
    let (idx, degraded) = match qualifying {
        Some(idx) => (idx, false),
        None => (largest_idx, true),
    };
    let plan = &service.plans[idx];

    let exceeded_dimensions: Vec<String> = usage
        .iter()
        .filter(|(dim, value)| !covers(plan, dim, **value))
        .map(|(dim, _)| dim.clone())
        .collect();

    let utilization: BTreeMap<String, Measure> = usage
        .iter()
        .filter_map(|(dim, value)| match plan.limits.get(dim)? {
            PlanLimit::Finite(limit) => Some((dim.clone(), Measure::ratio(*value, *limit).map(round2))),
            PlanLimit::Unlimited => None,
        })
        .collect();

    let mut insights = Vec::new();
    if degraded {
        insights.push(insights::degraded_tier(name, &plan.name, &exceeded_dimensions));
    }
    for (dim, fraction) in &utilization {
        if let Some(fraction) = fraction.value()
            && fraction <= 1.0
        {
            insights.extend(insights::plan_headroom(&plan.name, dim, fraction));
        }
    }

    Ok(TierRecommendation {
        service: name.to_string(),
        category: service.category.clone(),
        plan: plan.name.clone(),
        monthly_price: plan.monthly_price,
        yearly_price: round2(plan.monthly_price * 12.0),
        degraded,
        exceeded_dimensions,
        utilization,
        next_plan: service.plans.get(idx + 1).map(|p| p.name.clone()),
        insights,
    })
}

pub fn recommend_saas_tier(
    catalog: &PriceCatalog,
    request: &SaasTierRequest,
) -> Result<TierRecommendation, ResolveError> {
    let (name, service) = find_service(catalog, &request.service)?;
    match_tier(name, service, &request.usage)
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedService {
    pub service: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaasComparison {
    pub category: String,
    /// Non-degraded matches first, then by price
    pub options: Vec<TierRecommendation>,
    /// Services that cannot be priced for this usage (unsupported dimension)
    pub skipped: Vec<SkippedService>,
}

pub fn compare_saas_services(
    catalog: &PriceCatalog,
    request: &CompareSaasRequest,
) -> Result<SaasComparison, ResolveError> {
    check_usage(&request.usage)?;

    let services = &catalog.saas().services;
    let wanted = request.category.trim();
    let in_category: Vec<(&String, &SaasService)> = services
        .iter()
        .filter(|(_, s)| s.category.eq_ignore_ascii_case(wanted))
        .collect();
    if in_category.is_empty() {
        let mut known: Vec<String> = services.values().map(|s| s.category.clone()).collect();
        known.sort_unstable();
        known.dedup();
        return Err(ResolveError::UnknownServiceCategory {
            category: request.category.clone(),
            known,
        });
    }

    let mut options = Vec::new();
    let mut skipped = Vec::new();
    for (name, service) in in_category {
        match match_tier(name, service, &request.usage) {
            Ok(recommendation) => options.push(recommendation),
            Err(e) => skipped.push(SkippedService {
                service: name.clone(),
                reason: e.to_string(),
            }),
        }
    }
    options.sort_by(|a, b| {
        a.degraded
            .cmp(&b.degraded)
            .then(a.monthly_price.total_cmp(&b.monthly_price))
            .then(a.service.cmp(&b.service))
    });

    Ok(SaasComparison {
        category: wanted.to_ascii_lowercase(),
        options,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightKind;

    fn catalog() -> PriceCatalog {
        PriceCatalog::embedded().unwrap()
    }

    fn usage(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn tier(service: &str, pairs: &[(&str, f64)]) -> Result<TierRecommendation, ResolveError> {
        recommend_saas_tier(
            &catalog(),
            &SaasTierRequest {
                service: service.to_string(),
                usage: usage(pairs),
            },
        )
    }

    #[test]
    fn test_cheapest_covering_plan() {
        let rec = tier("supabase", &[("database_gb", 4.0), ("monthly_active_users", 20_000.0)])
            .unwrap();
        assert_eq!(rec.plan, "Pro");
        assert_eq!(rec.monthly_price, 25.0);
        assert!(!rec.degraded);
        assert_eq!(rec.next_plan.as_deref(), Some("Team"));
    }

    #[test]
    fn test_free_plan_for_small_usage() {
        let rec = tier("neon", &[("storage_gb", 0.1)]).unwrap();
        assert_eq!(rec.plan, "Free");
        assert_eq!(rec.category, "database");
    }

    #[test]
    fn test_unlimited_limit_covers_any_usage() {
        let rec = tier("clerk", &[("monthly_active_users", 5_000_000.0)]).unwrap();
        assert_eq!(rec.plan, "Enterprise");
        assert!(!rec.degraded);
        assert!(rec.utilization.is_empty());
    }

    #[test]
    fn test_missing_limit_fails_closed() {
        // Enterprise has unlimited bandwidth but declares no team_members limit.
        let rec = tier("vercel", &[("bandwidth_gb", 5_000.0), ("team_members", 3.0)]).unwrap();
        assert!(rec.degraded);
        assert_eq!(rec.plan, "Enterprise");
        assert_eq!(rec.exceeded_dimensions, vec!["team_members"]);
        assert_eq!(rec.insights[0].kind, InsightKind::Warning);
    }

    #[test]
    fn test_exceeding_every_plan_degrades_to_largest() {
        let rec = tier("neon", &[("storage_gb", 10_000.0)]).unwrap();
        assert!(rec.degraded);
        assert_eq!(rec.plan, "Business");
        assert_eq!(rec.exceeded_dimensions, vec!["storage_gb"]);
        assert_eq!(rec.next_plan, None);
    }

    #[test]
    fn test_near_limit_predicts_upgrade() {
        let rec = tier("neon", &[("storage_gb", 9.0)]).unwrap();
        assert_eq!(rec.plan, "Launch");
        assert_eq!(rec.utilization["storage_gb"], Measure::Value(0.9));
        assert!(rec.insights.iter().any(|i| i.kind == InsightKind::Prediction));
    }

    #[test]
    fn test_unknown_dimension() {
        let err = tier("neon", &[("seats", 3.0)]).unwrap_err();
        assert_eq!(err.field(), "usage.seats");
        assert_eq!(
            err.valid_values().unwrap(),
            ["compute_hours".to_string(), "storage_gb".to_string()]
        );
    }

    #[test]
    fn test_unknown_service() {
        let err = tier("firebase", &[]).unwrap_err();
        assert_eq!(err.code(), "unknown_service");
        assert!(err.valid_values().unwrap().contains(&"supabase".to_string()));
    }

    #[test]
    fn test_service_lookup_is_case_insensitive() {
        assert_eq!(tier("MongoDB_Atlas", &[]).unwrap().service, "mongodb_atlas");
    }

    #[test]
    fn test_compare_database_services() {
        let comparison = compare_saas_services(
            &catalog(),
            &CompareSaasRequest {
                category: "database".into(),
                usage: usage(&[("storage_gb", 5.0)]),
            },
        )
        .unwrap();
        let services: Vec<&str> = comparison.options.iter().map(|o| o.service.as_str()).collect();
        // neon Launch $19, supabase Pro $25, mongodb_atlas M10 $57
        assert_eq!(services, vec!["neon", "supabase", "mongodb_atlas"]);
        assert!(comparison.skipped.is_empty());
    }

    #[test]
    fn test_compare_skips_services_without_dimension() {
        let comparison = compare_saas_services(
            &catalog(),
            &CompareSaasRequest {
                category: "database".into(),
                usage: usage(&[("compute_hours", 100.0)]),
            },
        )
        .unwrap();
        assert_eq!(comparison.options.len(), 1);
        assert_eq!(comparison.options[0].service, "neon");
        assert_eq!(comparison.skipped.len(), 2);
    }

    #[test]
    fn test_compare_unknown_category() {
        let err = compare_saas_services(
            &catalog(),
            &CompareSaasRequest {
                category: "email".into(),
                usage: BTreeMap::new(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_service_category");
        assert_eq!(
            err.valid_values().unwrap(),
            ["auth".to_string(), "database".to_string(), "hosting".to_string()]
        );
    }
}
