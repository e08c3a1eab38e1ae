//! Break-even between two (upfront, monthly) cost options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ResolveError;
use crate::{
    formulas::{Crossover, break_even, round1, round2},
    insights::{self, Insight},
};

const DEFAULT_HORIZON_MONTHS: u32 = 36;

fn default_horizon() -> u32 {
    DEFAULT_HORIZON_MONTHS
}

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CostOption {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[validate(range(min = 0.0))]
    pub upfront_cost: f64,

    #[validate(range(min = 0.0))]
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BreakEvenRequest {
    #[validate(nested)]
    pub option_a: CostOption,

    #[validate(nested)]
    pub option_b: CostOption,

    /// Months over which totals are compared
    #[serde(default = "default_horizon")]
    #[validate(range(min = 1, max = 600))]
    pub horizon_months: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakEvenStatus {
    /// Monthly costs are equal; the cheaper upfront option wins from month 0
    Immediate,
    /// The options cross after `break_even_months`
    BreakEven,
    /// The curves never cross; one option dominates
    NoBreakEven,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionTotal {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakEvenResult {
    pub status: BreakEvenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_even_months: Option<f64>,
    /// The option that is cheaper over the long run, if the options differ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_term_winner: Option<String>,
    pub horizon_months: u32,
    pub horizon_totals: [OptionTotal; 2],
    pub insights: Vec<Insight>,
}

pub fn calculate_break_even(request: &BreakEvenRequest) -> Result<BreakEvenResult, ResolveError> {
    let a = &request.option_a;
    let b = &request.option_b;
    let name_a = a.name.clone().unwrap_or_else(|| "A".to_string());
    let name_b = b.name.clone().unwrap_or_else(|| "B".to_string());

    let crossover = break_even(a.upfront_cost, a.monthly_cost, b.upfront_cost, b.monthly_cost);

    // With differing monthly costs the lower monthly cost wins eventually;
    // otherwise the lower upfront cost wins outright.
    let cheaper_monthly = || {
        if a.monthly_cost < b.monthly_cost {
            name_a.clone()
        } else {
            name_b.clone()
        }
    };
    let cheaper_upfront = || {
        if a.upfront_cost < b.upfront_cost {
            Some(name_a.clone())
        } else if b.upfront_cost < a.upfront_cost {
            Some(name_b.clone())
        } else {
            None
        }
    };

    let (status, months, winner) = match crossover {
        Crossover::Immediate => (BreakEvenStatus::Immediate, Some(0.0), cheaper_upfront()),
        Crossover::AfterMonths(m) => (
            BreakEvenStatus::BreakEven,
            Some(round1(m)),
            Some(cheaper_monthly()),
        ),
        Crossover::Never => (BreakEvenStatus::NoBreakEven, None, Some(cheaper_monthly())),
    };

    let horizon = f64::from(request.horizon_months);
    let horizon_totals = [
        OptionTotal {
            name: name_a.clone(),
            total: round2(a.upfront_cost + a.monthly_cost * horizon),
        },
        OptionTotal {
            name: name_b.clone(),
            total: round2(b.upfront_cost + b.monthly_cost * horizon),
        },
    ];

    let insights = months
        .and_then(|m| insights::break_even_beyond_horizon(m, request.horizon_months))
        .into_iter()
        .collect();

    Ok(BreakEvenResult {
        status,
        break_even_months: months,
        long_term_winner: winner,
        horizon_months: request.horizon_months,
        horizon_totals,
        insights,
    })
}
