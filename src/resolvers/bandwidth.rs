//! Tiered egress pricing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ResolveError, owned};
use crate::{
    catalog::PriceCatalog,
    formulas::{BandwidthTier, Measure, TierCharge, first_misordered_tier, round4, tiered_cost},
    insights::{self, Insight},
};

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BandwidthCostRequest {
    /// Egress per month in GB
    #[validate(range(min = 0.0))]
    pub gb_per_month: f64,

    /// Provider whose published tiers apply
    #[serde(default)]
    pub provider: Option<String>,

    /// Explicit price tiers; override the provider's tiers when given
    #[serde(default)]
    pub tiers: Option<Vec<BandwidthTier>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BandwidthCostEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub gb_per_month: f64,
    pub breakdown: Vec<TierCharge>,
    pub total_cost: f64,
    pub effective_rate_per_gb: Measure,
    pub extended_last_tier: bool,
    pub insights: Vec<Insight>,
}

fn check_tiers(tiers: &[BandwidthTier]) -> Result<(), ResolveError> {
    if tiers.is_empty() {
        return Err(ResolveError::invalid("tiers", "at least one tier is required"));
    }
    if let Some(idx) = tiers.iter().position(|t| !t.per_gb.is_finite() || t.per_gb < 0.0) {
        return Err(ResolveError::invalid(
            format!("tiers[{idx}].per_gb"),
            "must be a non-negative number",
        ));
    }
    if let Some(idx) = first_misordered_tier(tiers) {
        return Err(ResolveError::invalid(
            format!("tiers[{idx}].up_to_gb"),
            "tier limits must be strictly ascending and only the last tier may be unbounded",
        ));
    }
    Ok(())
}

pub fn estimate_bandwidth_cost(
    catalog: &PriceCatalog,
    request: &BandwidthCostRequest,
) -> Result<BandwidthCostEstimate, ResolveError> {
    let provider_tiers = match &request.provider {
        Some(provider) => {
            let document = catalog
                .cloud(provider)
                .ok_or_else(|| ResolveError::UnknownProvider {
                    provider: provider.clone(),
                    known: owned(catalog.cloud_providers()),
                })?;
            Some(document.bandwidth_tiers.as_slice())
        }
        None => None,
    };

    let tiers = match (&request.tiers, provider_tiers) {
        (Some(explicit), _) => explicit.as_slice(),
        (None, Some(published)) => published,
        (None, None) => {
            return Err(ResolveError::invalid(
                "provider",
                "either provider or tiers is required",
            ));
        }
    };
    check_tiers(tiers)?;

    let cost = tiered_cost(tiers, request.gb_per_month);

    let mut insights = Vec::new();
    if cost.extended_last_tier
        && let Some(last) = tiers.last()
    {
        insights.push(insights::extended_tier(last.per_gb));
    }
    insights.extend(insights::high_bandwidth(request.gb_per_month));

    Ok(BandwidthCostEstimate {
        provider: request.provider.clone(),
        gb_per_month: request.gb_per_month,
        effective_rate_per_gb: Measure::ratio(cost.total_cost, request.gb_per_month).map(round4),
        breakdown: cost.breakdown,
        total_cost: cost.total_cost,
        extended_last_tier: cost.extended_last_tier,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightKind;

    fn tiers(raw: &[(Option<f64>, f64)]) -> Vec<BandwidthTier> {
        raw.iter()
            .map(|(up_to_gb, per_gb)| BandwidthTier {
                up_to_gb: *up_to_gb,
                per_gb: *per_gb,
            })
            .collect()
    }

    fn request(gb: f64, provider: Option<&str>, tiers: Option<Vec<BandwidthTier>>) -> BandwidthCostRequest {
        BandwidthCostRequest {
            gb_per_month: gb,
            provider: provider.map(str::to_string),
            tiers,
        }
    }

    #[test]
    fn test_explicit_tiers() {
        let estimate = estimate_bandwidth_cost(
            &PriceCatalog::embedded().unwrap(),
            &request(
                15_000.0,
                None,
                Some(tiers(&[(Some(10_000.0), 0.09), (None, 0.05)])),
            ),
        )
        .unwrap();
        assert_eq!(estimate.breakdown[0].cost, 900.0);
        assert_eq!(estimate.breakdown[1].cost, 250.0);
        assert_eq!(estimate.total_cost, 1150.0);
        assert!(!estimate.extended_last_tier);
        assert!(estimate.insights.iter().any(|i| i.kind == InsightKind::Action));
    }

    #[test]
    fn test_provider_tiers() {
        let estimate = estimate_bandwidth_cost(
            &PriceCatalog::embedded().unwrap(),
            &request(50.0, Some("azure"), None),
        )
        .unwrap();
        // First 100 GB are free on azure.
        assert_eq!(estimate.total_cost, 0.0);
        assert_eq!(estimate.effective_rate_per_gb, Measure::Value(0.0));
    }

    #[test]
    fn test_bounded_tiers_are_extended() {
        let estimate = estimate_bandwidth_cost(
            &PriceCatalog::embedded().unwrap(),
            &request(150.0, None, Some(tiers(&[(Some(100.0), 0.1)]))),
        )
        .unwrap();
        assert!(estimate.extended_last_tier);
        assert_eq!(estimate.total_cost, 15.0);
        assert_eq!(estimate.insights[0].kind, InsightKind::Warning);
    }

    #[test]
    fn test_misordered_tiers_name_the_field() {
        let err = estimate_bandwidth_cost(
            &PriceCatalog::embedded().unwrap(),
            &request(
                10.0,
                None,
                Some(tiers(&[(Some(100.0), 0.1), (Some(50.0), 0.05)])),
            ),
        )
        .unwrap_err();
        assert_eq!(err.field(), "tiers[1].up_to_gb");
    }

    #[test]
    fn test_requires_provider_or_tiers() {
        let err = estimate_bandwidth_cost(&PriceCatalog::embedded().unwrap(), &request(10.0, None, None))
            .unwrap_err();
        assert_eq!(err.field(), "provider");
    }

    #[test]
    fn test_zero_gb_has_no_rate() {
        let estimate = estimate_bandwidth_cost(
            &PriceCatalog::embedded().unwrap(),
            &request(0.0, Some("aws"), None),
        )
        .unwrap();
        assert_eq!(estimate.total_cost, 0.0);
        assert_eq!(estimate.effective_rate_per_gb, Measure::NotApplicable);
    }
}
