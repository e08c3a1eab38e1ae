//! Compounding monthly cost forecast with optional step changes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ResolveError;
use crate::{
    formulas::{Measure, compound_series, round2},
    insights::{self, COST_CLIFF_GROWTH, Insight},
};

/// A fixed amount added to every month from `month` on (negative to remove
/// a cost), e.g. a new hire or a decommissioned service.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StepChange {
    #[validate(range(min = 1))]
    pub month: u32,

    pub amount: f64,

    #[serde(default)]
    #[validate(length(max = 128))]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ForecastRequest {
    /// Current monthly cost (month 0)
    #[validate(range(min = 0.0))]
    pub base_monthly_cost: f64,

    /// Month-over-month growth as a fraction (0.05 = 5 %)
    #[validate(range(min = -0.99, max = 10.0))]
    pub monthly_growth_rate: f64,

    #[validate(range(min = 1, max = 120))]
    pub months: u32,

    #[serde(default)]
    #[validate(nested)]
    pub step_changes: Vec<StepChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastMonth {
    pub month: u32,
    pub cost: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostCliff {
    pub month: u32,
    pub previous: f64,
    pub cost: f64,
    pub increase: Measure,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostForecast {
    pub base_monthly_cost: f64,
    pub monthly_growth_rate: f64,
    pub months: Vec<ForecastMonth>,
    pub total_cost: f64,
    pub average_monthly_cost: f64,
    pub final_monthly_cost: f64,
    /// Final month relative to the base month
    pub growth_multiple: Measure,
    pub cost_cliffs: Vec<CostCliff>,
    pub insights: Vec<Insight>,
}

pub fn forecast_costs(request: &ForecastRequest) -> Result<CostForecast, ResolveError> {
    for (idx, step) in request.step_changes.iter().enumerate() {
        if step.month > request.months {
            return Err(ResolveError::invalid(
                format!("step_changes[{idx}].month"),
                format!("must be within the {}-month forecast", request.months),
            ));
        }
    }

    let base = request.base_monthly_cost;
    let series = compound_series(base, request.monthly_growth_rate, request.months);

    let mut months = Vec::with_capacity(series.len());
    let mut cost_cliffs = Vec::new();
    let mut previous = base;
    let mut cumulative = 0.0;
    for (month, compounded) in (1..).zip(series) {
        let steps: f64 = request
            .step_changes
            .iter()
            .filter(|s| s.month <= month)
            .map(|s| s.amount)
            .sum();
        let cost = (compounded + steps).max(0.0);
        cumulative += cost;

        if cost > previous * (1.0 + COST_CLIFF_GROWTH) {
            cost_cliffs.push(CostCliff {
                month,
                previous: round2(previous),
                cost: round2(cost),
                increase: Measure::ratio(cost - previous, previous).map(round2),
            });
        }

        months.push(ForecastMonth {
            month,
            cost: round2(cost),
            cumulative: round2(cumulative),
        });
        previous = cost;
    }

    let total_cost = round2(cumulative);
    let final_monthly_cost = months.last().map_or(base, |m| m.cost);

    let mut insights: Vec<Insight> = cost_cliffs
        .iter()
        .map(|c| insights::cost_cliff(c.month, c.previous, c.cost))
        .collect();
    insights.extend(insights::forecast_growth(total_cost, base, request.months));

    Ok(CostForecast {
        base_monthly_cost: base,
        monthly_growth_rate: request.monthly_growth_rate,
        average_monthly_cost: round2(cumulative / f64::from(request.months)),
        final_monthly_cost,
        growth_multiple: Measure::ratio(final_monthly_cost, base).map(round2),
        total_cost,
        months,
        cost_cliffs,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightKind;

    fn request(base: f64, growth: f64, months: u32, steps: Vec<StepChange>) -> ForecastRequest {
        ForecastRequest {
            base_monthly_cost: base,
            monthly_growth_rate: growth,
            months,
            step_changes: steps,
        }
    }

    #[test]
    fn test_flat_forecast() {
        let forecast = forecast_costs(&request(1_000.0, 0.0, 12, vec![])).unwrap();
        assert_eq!(forecast.months.len(), 12);
        assert_eq!(forecast.total_cost, 12_000.0);
        assert_eq!(forecast.growth_multiple, Measure::Value(1.0));
        assert!(forecast.cost_cliffs.is_empty());
        assert!(forecast.insights.is_empty());
    }

    #[test]
    fn test_compounding_growth() {
        let forecast = forecast_costs(&request(100.0, 0.1, 3, vec![])).unwrap();
        let costs: Vec<f64> = forecast.months.iter().map(|m| m.cost).collect();
        assert_eq!(costs, vec![110.0, 121.0, 133.1]);
        assert_eq!(forecast.total_cost, 364.1);
        assert_eq!(forecast.months[2].cumulative, 364.1);
    }

    #[test]
    fn test_step_change_creates_cliff() {
        let forecast = forecast_costs(&request(
            1_000.0,
            0.0,
            6,
            vec![StepChange {
                month: 4,
                amount: 800.0,
                label: Some("GPU cluster".into()),
            }],
        ))
        .unwrap();
        assert_eq!(forecast.months[3].cost, 1_800.0);
        assert_eq!(forecast.cost_cliffs.len(), 1);
        assert_eq!(forecast.cost_cliffs[0].month, 4);
        assert_eq!(forecast.cost_cliffs[0].increase, Measure::Value(0.8));
        assert_eq!(forecast.insights[0].kind, InsightKind::Warning);
    }

    #[test]
    fn test_first_month_cliff_compares_to_base() {
        let forecast = forecast_costs(&request(100.0, 0.6, 2, vec![])).unwrap();
        assert_eq!(forecast.cost_cliffs.len(), 2);
        assert_eq!(forecast.cost_cliffs[0].month, 1);
        assert_eq!(forecast.cost_cliffs[0].previous, 100.0);
    }

    #[test]
    fn test_aggressive_growth_prediction() {
        let forecast = forecast_costs(&request(100.0, 0.2, 12, vec![])).unwrap();
        assert!(
            forecast
                .insights
                .iter()
                .any(|i| i.kind == InsightKind::Prediction)
        );
    }

    #[test]
    fn test_step_outside_forecast_rejected() {
        let err = forecast_costs(&request(
            100.0,
            0.0,
            3,
            vec![StepChange {
                month: 5,
                amount: 10.0,
                label: None,
            }],
        ))
        .unwrap_err();
        assert_eq!(err.field(), "step_changes[0].month");
    }

    #[test]
    fn test_zero_base_growth_multiple_not_applicable() {
        let forecast = forecast_costs(&request(0.0, 0.1, 3, vec![])).unwrap();
        assert_eq!(forecast.growth_multiple, Measure::NotApplicable);
        assert_eq!(forecast.total_cost, 0.0);
    }
}
