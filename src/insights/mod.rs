//! Rule-based annotations attached to resolver results.
//!
//! Each rule is an independent threshold check. Rules only add commentary;
//! they never change the figures they are attached to.

use serde::Serialize;

use crate::formulas::{Measure, round2};

/// Utilization below this fraction flags the resource as overprovisioned.
pub const LOW_UTILIZATION: f64 = 0.30;
/// On-demand hours per month at or above which a reservation pays off.
pub const RESERVED_HOURS_THRESHOLD: f64 = 500.0;
/// Monthly AI spend above which a benchmark review is suggested.
pub const HIGH_AI_SPEND_USD: f64 = 5_000.0;
/// Monthly egress above which a CDN or egress review is suggested.
pub const HIGH_BANDWIDTH_GB: f64 = 10_000.0;
/// Month-over-month growth above which a month counts as a cost cliff.
pub const COST_CLIFF_GROWTH: f64 = 0.50;
/// Forecast total above this multiple of a flat forecast is flagged.
pub const FORECAST_GROWTH_MULTIPLE: f64 = 2.0;
pub const RUNWAY_CRITICAL_MONTHS: f64 = 6.0;
pub const RUNWAY_CAUTION_MONTHS: f64 = 12.0;
pub const BURN_MULTIPLE_LIMIT: f64 = 2.0;
/// Plan usage above this fraction of a limit suggests upgrading soon.
pub const PLAN_HEADROOM_LIMIT: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Warning,
    Opportunity,
    Prediction,
    Benchmark,
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_usd: Option<f64>,
}

impl Insight {
    pub fn new(kind: InsightKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            impact_usd: None,
        }
    }

    pub fn with_impact(mut self, impact_usd: f64) -> Self {
        self.impact_usd = Some(round2(impact_usd));
        self
    }
}

pub fn low_utilization(monthly_cost: f64, utilization: Option<f64>) -> Option<Insight> {
    let utilization = utilization?;
    (utilization < LOW_UTILIZATION).then(|| {
        Insight::new(
            InsightKind::Warning,
            format!(
                "Utilization is {:.0}%; the resource looks overprovisioned. Consider a smaller size.",
                utilization * 100.0
            ),
        )
        .with_impact(monthly_cost * (1.0 - utilization))
    })
}

pub fn reserved_opportunity(hours_per_month: f64, one_year_monthly_savings: f64) -> Option<Insight> {
    (hours_per_month >= RESERVED_HOURS_THRESHOLD && one_year_monthly_savings > 0.0).then(|| {
        Insight::new(
            InsightKind::Opportunity,
            format!(
                "Running {hours_per_month:.0} h/month on demand; a 1-year reservation saves ${one_year_monthly_savings:.2}/month."
            ),
        )
        .with_impact(one_year_monthly_savings)
    })
}

pub fn high_ai_spend(monthly_cost: Option<f64>) -> Option<Insight> {
    let monthly_cost = monthly_cost?;
    (monthly_cost > HIGH_AI_SPEND_USD).then(|| {
        Insight::new(
            InsightKind::Benchmark,
            format!(
                "Monthly AI spend of ${monthly_cost:.2} is above ${HIGH_AI_SPEND_USD:.0}; benchmark smaller models and prompt caching."
            ),
        )
    })
}

/// `impact` is the saving per request, or per month when the request volume
/// is known.
pub fn cheaper_model(current: &str, cheaper: &str, impact: f64, per_month: bool) -> Insight {
    let unit = if per_month { "month" } else { "request" };
    Insight::new(
        InsightKind::Opportunity,
        format!("Switching from {current} to {cheaper} saves ${impact:.4} per {unit}."),
    )
    .with_impact(impact)
}

pub fn high_bandwidth(gb_per_month: f64) -> Option<Insight> {
    (gb_per_month > HIGH_BANDWIDTH_GB).then(|| {
        Insight::new(
            InsightKind::Action,
            format!(
                "{gb_per_month:.0} GB/month of egress; review CDN caching and cross-region transfer."
            ),
        )
    })
}

pub fn extended_tier(last_rate: f64) -> Insight {
    Insight::new(
        InsightKind::Warning,
        format!(
            "Transfer exceeds every published tier; the remainder was billed at the last rate (${last_rate}/GB)."
        ),
    )
}

pub fn cost_cliff(month: u32, previous: f64, cost: f64) -> Insight {
    Insight::new(
        InsightKind::Warning,
        format!("Cost jumps from ${previous:.2} to ${cost:.2} in month {month}."),
    )
    .with_impact(cost - previous)
}

pub fn forecast_growth(total: f64, base_monthly: f64, months: u32) -> Option<Insight> {
    let flat = base_monthly * f64::from(months);
    (flat > 0.0 && total > FORECAST_GROWTH_MULTIPLE * flat).then(|| {
        Insight::new(
            InsightKind::Prediction,
            format!(
                "Projected spend of ${total:.2} over {months} months is more than double the flat-rate ${flat:.2}."
            ),
        )
        .with_impact(total - flat)
    })
}

pub fn runway(runway_months: Measure) -> Option<Insight> {
    match runway_months {
        Measure::Unbounded => Some(Insight::new(
            InsightKind::Prediction,
            "Revenue covers costs; cash runway is unbounded at the current burn.",
        )),
        Measure::Value(months) if months < RUNWAY_CRITICAL_MONTHS => Some(Insight::new(
            InsightKind::Warning,
            format!("Only {months} months of runway left; cut costs or raise now."),
        )),
        Measure::Value(months) if months < RUNWAY_CAUTION_MONTHS => Some(Insight::new(
            InsightKind::Action,
            format!("{months} months of runway; start fundraising or cost planning."),
        )),
        _ => None,
    }
}

pub fn burn_multiple(multiple: Measure) -> Option<Insight> {
    match multiple {
        Measure::Value(m) if m > BURN_MULTIPLE_LIMIT => Some(Insight::new(
            InsightKind::Warning,
            format!("Burn multiple of {m} is above {BURN_MULTIPLE_LIMIT}; growth is expensive."),
        )),
        _ => None,
    }
}

pub fn degraded_tier(service: &str, plan: &str, exceeded: &[String]) -> Insight {
    Insight::new(
        InsightKind::Warning,
        format!(
            "No {service} plan covers the requested usage; {plan} is the largest plan and falls short on: {}.",
            exceeded.join(", ")
        ),
    )
}

pub fn plan_headroom(plan: &str, dimension: &str, usage_fraction: f64) -> Option<Insight> {
    (usage_fraction > PLAN_HEADROOM_LIMIT).then(|| {
        Insight::new(
            InsightKind::Prediction,
            format!(
                "{dimension} is at {:.0}% of the {plan} limit; expect to upgrade soon.",
                usage_fraction * 100.0
            ),
        )
    })
}

pub fn break_even_beyond_horizon(months: f64, horizon_months: u32) -> Option<Insight> {
    (months > f64::from(horizon_months)).then(|| {
        Insight::new(
            InsightKind::Action,
            format!(
                "Break-even at {months:.1} months is beyond the {horizon_months}-month horizon; the upfront option may not pay off."
            ),
        )
    })
}
