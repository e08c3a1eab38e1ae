//! AI model token pricing, comparison and recommendation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Alternative, ResolveError, not_blank, owned};
use crate::{
    catalog::{Latency, ModelRef, PriceCatalog},
    classifier::{ClassificationResult, TaskCategory},
    formulas::{TokenCost, round2, round4, token_cost_breakdown},
    insights::{self, Insight},
};

const DEFAULT_ALTERNATIVES: usize = 3;
const DEFAULT_RANKING_LIMIT: usize = 10;
const DEFAULT_RECOMMENDATIONS: usize = 3;

fn default_alternatives() -> usize {
    DEFAULT_ALTERNATIVES
}

fn default_ranking_limit() -> usize {
    DEFAULT_RANKING_LIMIT
}

fn default_recommendations() -> usize {
    DEFAULT_RECOMMENDATIONS
}

fn default_input_tokens() -> u64 {
    1_000
}

fn default_output_tokens() -> u64 {
    500
}

/// Token cost for a single provider's model.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TokenCostRequest {
    /// Model ID or alias (e.g. "gpt-4o", "sonnet")
    #[validate(length(min = 1, max = 128))]
    pub model: String,

    /// Input (prompt) tokens per request
    pub input_tokens: u64,

    /// Output (completion) tokens per request
    pub output_tokens: u64,

    /// Requests per month; enables monthly cost and spend insights
    #[serde(default)]
    #[validate(range(min = 1))]
    pub requests_per_month: Option<u64>,

    /// Number of same-provider alternatives to return
    #[serde(default = "default_alternatives")]
    #[validate(range(max = 20))]
    pub alternatives: usize,
}

/// Token cost for any catalog provider.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModelCostRequest {
    /// Catalog provider (e.g. "openai", "anthropic", "openrouter")
    #[validate(length(min = 1, max = 64))]
    pub provider: String,

    #[validate(length(min = 1, max = 128))]
    pub model: String,

    pub input_tokens: u64,

    pub output_tokens: u64,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub requests_per_month: Option<u64>,

    #[serde(default = "default_alternatives")]
    #[validate(range(max = 20))]
    pub alternatives: usize,
}

impl ModelCostRequest {
    pub fn into_parts(self) -> (String, TokenCostRequest) {
        (
            self.provider,
            TokenCostRequest {
                model: self.model,
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                requests_per_month: self.requests_per_month,
                alternatives: self.alternatives,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenCostEstimate {
    pub provider: String,
    pub model: String,
    pub display_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_per_million: f64,
    pub output_per_million: f64,
    #[serde(flatten)]
    pub cost: TokenCost,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_cost: Option<f64>,
    pub alternatives: Vec<Alternative>,
    pub insights: Vec<Insight>,
}

fn known_models(catalog: &PriceCatalog, provider: &str) -> Vec<String> {
    catalog
        .provider_models(provider)
        .map(|m| m.id.to_string())
        .collect()
}

fn monthly(total: f64, requests_per_month: Option<u64>) -> Option<f64> {
    requests_per_month.map(|r| round2(total * r as f64))
}

pub fn estimate_token_cost(
    catalog: &PriceCatalog,
    provider: &str,
    request: &TokenCostRequest,
) -> Result<TokenCostEstimate, ResolveError> {
    let Some(document) = catalog.ai_provider(provider) else {
        return Err(ResolveError::UnknownProvider {
            provider: provider.to_string(),
            known: owned(catalog.ai_providers()),
        });
    };
    let Some((model_id, entry)) = catalog.resolve_model(provider, &request.model) else {
        return Err(ResolveError::UnknownModel {
            provider: provider.to_string(),
            model: request.model.clone(),
            known: known_models(catalog, provider),
        });
    };

    let cost = token_cost_breakdown(
        request.input_tokens,
        request.output_tokens,
        entry.input_per_million,
        entry.output_per_million,
    );
    let monthly_cost = monthly(cost.total_cost, request.requests_per_month);

    let mut priced: Vec<Alternative> = catalog
        .provider_models(provider)
        .filter(|m| m.id != model_id)
        .map(|m| {
            let alt = token_cost_breakdown(
                request.input_tokens,
                request.output_tokens,
                m.entry.input_per_million,
                m.entry.output_per_million,
            );
            Alternative {
                provider: m.provider.to_string(),
                model: m.id.to_string(),
                display_name: m.entry.display_name.clone(),
                total_cost: alt.total_cost,
                savings: round4(cost.total_cost - alt.total_cost),
                monthly_cost: monthly(alt.total_cost, request.requests_per_month),
            }
        })
        .collect();
    priced.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost).then(a.model.cmp(&b.model)));

    let mut insights = Vec::new();
    if let Some(cheapest) = priced.first().filter(|alt| alt.total_cost < cost.total_cost) {
        let (impact, per_month) = match request.requests_per_month {
            Some(requests) => (cheapest.savings * requests as f64, true),
            None => (cheapest.savings, false),
        };
        insights.push(insights::cheaper_model(
            model_id,
            &cheapest.model,
            impact,
            per_month,
        ));
    }
    insights.extend(insights::high_ai_spend(monthly_cost));

    priced.truncate(request.alternatives);

    Ok(TokenCostEstimate {
        provider: document.provider.clone(),
        model: model_id.to_string(),
        display_name: entry.display_name.clone(),
        input_tokens: request.input_tokens,
        output_tokens: request.output_tokens,
        input_per_million: entry.input_per_million,
        output_per_million: entry.output_per_million,
        cost,
        monthly_cost,
        alternatives: priced,
        insights,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Cross-provider ranking
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompareModelsRequest {
    pub input_tokens: u64,

    pub output_tokens: u64,

    /// Restrict to these providers (all when empty)
    #[serde(default)]
    pub providers: Vec<String>,

    /// Only models suited to this task category
    #[serde(default)]
    pub category: Option<TaskCategory>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub requests_per_month: Option<u64>,

    #[serde(default = "default_ranking_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedModel {
    pub rank: usize,
    pub provider: String,
    pub model: String,
    pub display_name: String,
    pub category: TaskCategory,
    pub latency: Latency,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelComparison {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub models: Vec<RankedModel>,
    /// Models that matched the filters before the limit was applied
    pub total_matched: usize,
    pub insights: Vec<Insight>,
}

fn suits(model: &ModelRef<'_>, category: TaskCategory) -> bool {
    model.entry.category == category || model.entry.best_for.contains(&category)
}

fn check_providers(catalog: &PriceCatalog, providers: &[String]) -> Result<(), ResolveError> {
    for provider in providers {
        if catalog.ai_provider(provider).is_none() {
            return Err(ResolveError::UnknownProvider {
                provider: provider.clone(),
                known: owned(catalog.ai_providers()),
            });
        }
    }
    Ok(())
}

fn rank<'a>(
    models: impl Iterator<Item = ModelRef<'a>>,
    input_tokens: u64,
    output_tokens: u64,
    requests_per_month: Option<u64>,
) -> Vec<RankedModel> {
    let mut ranked: Vec<RankedModel> = models
        .map(|m| {
            let cost = token_cost_breakdown(
                input_tokens,
                output_tokens,
                m.entry.input_per_million,
                m.entry.output_per_million,
            );
            RankedModel {
                rank: 0,
                provider: m.provider.to_string(),
                model: m.id.to_string(),
                display_name: m.entry.display_name.clone(),
                category: m.entry.category,
                latency: m.entry.latency,
                total_cost: cost.total_cost,
                monthly_cost: monthly(cost.total_cost, requests_per_month),
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.total_cost
            .total_cmp(&b.total_cost)
            .then_with(|| a.provider.cmp(&b.provider))
            .then_with(|| a.model.cmp(&b.model))
    });
    for (idx, model) in ranked.iter_mut().enumerate() {
        model.rank = idx + 1;
    }
    ranked
}

pub fn compare_models(
    catalog: &PriceCatalog,
    request: &CompareModelsRequest,
) -> Result<ModelComparison, ResolveError> {
    check_providers(catalog, &request.providers)?;

    let candidates = catalog.models().filter(|m| {
        (request.providers.is_empty()
            || request
                .providers
                .iter()
                .any(|p| p.eq_ignore_ascii_case(m.provider)))
            && request.category.is_none_or(|c| suits(m, c))
    });
    let mut models = rank(
        candidates,
        request.input_tokens,
        request.output_tokens,
        request.requests_per_month,
    );
    let total_matched = models.len();

    let mut insights = Vec::new();
    if let (Some(cheapest), Some(priciest)) = (models.first(), models.last())
        && priciest.total_cost > cheapest.total_cost
    {
        let spread = priciest.total_cost - cheapest.total_cost;
        let (impact, per_month) = match request.requests_per_month {
            Some(requests) => (spread * requests as f64, true),
            None => (spread, false),
        };
        insights.push(insights::cheaper_model(
            &priciest.model,
            &cheapest.model,
            impact,
            per_month,
        ));
    }
    insights.extend(insights::high_ai_spend(
        models.first().and_then(|m| m.monthly_cost),
    ));

    models.truncate(request.limit);
    Ok(ModelComparison {
        input_tokens: request.input_tokens,
        output_tokens: request.output_tokens,
        models,
        total_matched,
        insights,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Recommendation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RecommendModelRequest {
    /// Free-text description of what the model will be used for
    #[validate(length(min = 1, max = 4000), custom(function = "not_blank"))]
    pub task_description: String,

    #[serde(default = "default_input_tokens")]
    pub input_tokens: u64,

    #[serde(default = "default_output_tokens")]
    pub output_tokens: u64,

    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub requests_per_month: Option<u64>,

    #[serde(default = "default_recommendations")]
    #[validate(range(min = 1, max = 20))]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelRecommendation {
    pub classification: ClassificationResult,
    /// False when no model lists the category and every model was ranked
    pub category_matched: bool,
    pub recommendations: Vec<RankedModel>,
    pub insights: Vec<Insight>,
}

/// Rank models suited to an already-classified task.
pub fn recommend_models(
    catalog: &PriceCatalog,
    classification: ClassificationResult,
    request: &RecommendModelRequest,
) -> Result<ModelRecommendation, ResolveError> {
    check_providers(catalog, &request.providers)?;

    let in_scope = |m: &ModelRef<'_>| {
        request.providers.is_empty()
            || request
                .providers
                .iter()
                .any(|p| p.eq_ignore_ascii_case(m.provider))
    };
    let category = classification.category;
    let category_matched = catalog
        .models()
        .any(|m| in_scope(&m) && m.entry.best_for.contains(&category));

    let candidates = catalog
        .models()
        .filter(|m| in_scope(m) && (!category_matched || m.entry.best_for.contains(&category)));
    let mut recommendations = rank(
        candidates,
        request.input_tokens,
        request.output_tokens,
        request.requests_per_month,
    );
    recommendations.truncate(request.limit);

    let insights = insights::high_ai_spend(recommendations.first().and_then(|m| m.monthly_cost))
        .into_iter()
        .collect();

    Ok(ModelRecommendation {
        classification,
        category_matched,
        recommendations,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{classifier::Confidence, insights::InsightKind};

    fn catalog() -> PriceCatalog {
        PriceCatalog::embedded().unwrap()
    }

    fn request(model: &str, input: u64, output: u64) -> TokenCostRequest {
        TokenCostRequest {
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
            requests_per_month: None,
            alternatives: DEFAULT_ALTERNATIVES,
        }
    }

    #[test]
    fn test_gpt4o_cost() {
        let estimate =
            estimate_token_cost(&catalog(), "openai", &request("gpt-4o", 1_000_000, 500_000))
                .unwrap();
        assert_eq!(estimate.cost.input_cost, 2.5);
        assert_eq!(estimate.cost.output_cost, 5.0);
        assert_eq!(estimate.cost.total_cost, 7.5);
        assert_eq!(estimate.alternatives.len(), 3);
        assert!(
            estimate
                .alternatives
                .windows(2)
                .all(|w| w[0].total_cost <= w[1].total_cost)
        );
    }

    #[test]
    fn test_alias_resolves_to_canonical_id() {
        let estimate =
            estimate_token_cost(&catalog(), "anthropic", &request("sonnet", 1000, 1000)).unwrap();
        assert_eq!(estimate.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_unknown_model_lists_known_models() {
        let err =
            estimate_token_cost(&catalog(), "openai", &request("gpt-9", 10, 10)).unwrap_err();
        let ResolveError::UnknownModel { known, .. } = &err else {
            panic!("expected UnknownModel, got {err:?}");
        };
        assert!(known.contains(&"gpt-4o".to_string()));
        assert!(known.contains(&"gpt-4o-mini".to_string()));
    }

    #[test]
    fn test_cheaper_model_opportunity() {
        let mut req = request("gpt-4o", 1_000_000, 1_000_000);
        req.requests_per_month = Some(1_000);
        let estimate = estimate_token_cost(&catalog(), "openai", &req).unwrap();

        let opportunity = estimate
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Opportunity)
            .expect("a cheaper openai model exists");
        assert!(opportunity.impact_usd.unwrap() > 0.0);
        // 12.5 per request × 1000 requests
        assert_eq!(estimate.monthly_cost, Some(12_500.0));
        assert!(estimate.insights.iter().any(|i| i.kind == InsightKind::Benchmark));
    }

    #[test]
    fn test_cheapest_model_has_no_switch_insight() {
        let estimate = estimate_token_cost(
            &catalog(),
            "openai",
            &request("text-embedding-3-small", 1_000_000, 0),
        )
        .unwrap();
        assert!(
            estimate
                .insights
                .iter()
                .all(|i| i.kind != InsightKind::Opportunity)
        );
        // Alternatives are still returned even though none is cheaper.
        assert!(!estimate.alternatives.is_empty());
        assert!(estimate.alternatives.iter().all(|a| a.savings <= 0.0));
    }

    #[test]
    fn test_compare_models_filters_by_category() {
        let comparison = compare_models(
            &catalog(),
            &CompareModelsRequest {
                input_tokens: 1_000_000,
                output_tokens: 1_000_000,
                providers: vec![],
                category: Some(TaskCategory::Reasoning),
                requests_per_month: None,
                limit: 10,
            },
        )
        .unwrap();
        assert!(comparison.total_matched >= 3);
        assert_eq!(comparison.models[0].rank, 1);
        assert!(
            comparison
                .models
                .iter()
                .all(|m| m.provider == "openai" || m.provider == "anthropic")
        );
    }

    #[test]
    fn test_compare_models_rejects_unknown_provider() {
        let err = compare_models(
            &catalog(),
            &CompareModelsRequest {
                input_tokens: 1,
                output_tokens: 1,
                providers: vec!["cohere".into()],
                category: None,
                requests_per_month: None,
                limit: 10,
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_provider");
    }

    #[test]
    fn test_recommend_uses_best_for() {
        let classification = ClassificationResult {
            category: TaskCategory::Audio,
            confidence: Confidence::Medium,
            matched_keywords: vec!["voice".into()],
            scores: BTreeMap::new(),
            used_fallback: false,
        };
        let recommendation = recommend_models(
            &catalog(),
            classification,
            &RecommendModelRequest {
                task_description: "voice app".into(),
                input_tokens: 1_000,
                output_tokens: 500,
                providers: vec![],
                requests_per_month: None,
                limit: 3,
            },
        )
        .unwrap();
        assert!(recommendation.category_matched);
        let ids: Vec<&str> = recommendation
            .recommendations
            .iter()
            .map(|m| m.model.as_str())
            .collect();
        assert!(ids.contains(&"gpt-4o-audio-preview") || ids.contains(&"gpt-4o"));
    }

    #[test]
    fn test_request_validation() {
        let req = RecommendModelRequest {
            task_description: "   ".into(),
            input_tokens: 1,
            output_tokens: 1,
            providers: vec![],
            requests_per_month: None,
            limit: 3,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("task_description"));
    }
}
