//! Pure pricing arithmetic shared by every resolver.
//!
//! Nothing in here touches the catalog or performs I/O. Rounding happens at
//! the edges the resolvers expose (4 decimal places for token costs, 2 for
//! dollar amounts, 1 for runway months) so intermediate sums stay exact.
//!
//! Ratios that can divide by zero return a [`Measure`] instead of `f64` so
//! `NaN` or `inf` never reach a serialized response.

use serde::{Deserialize, Serialize, Serializer};

/// Average hours in a month (8760 / 12), the billing convention used by the
/// major cloud providers.
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Tokens are priced per million.
const TOKENS_PER_RATE_UNIT: f64 = 1_000_000.0;

/// Round `value` to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

/// A figure that may legitimately have no finite value.
///
/// Serializes as a plain JSON number when finite, otherwise as the string
/// `"unbounded"` or `"not_applicable"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Value(f64),
    /// Grows without limit (e.g. runway when revenue covers burn).
    Unbounded,
    /// The ratio has no meaning for the inputs (e.g. a zero denominator).
    NotApplicable,
}

impl Measure {
    /// Wrap a computed value, mapping non-finite results to sentinels.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            Self::NotApplicable
        } else if value.is_infinite() {
            Self::Unbounded
        } else {
            Self::Value(value)
        }
    }

    /// `numerator / denominator`, or `NotApplicable` when the denominator is zero.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() {
            return Self::NotApplicable;
        }
        Self::from_f64(numerator / denominator)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Value(v) => Self::from_f64(f(v)),
            other => other,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Unbounded => serializer.serialize_str("unbounded"),
            Self::NotApplicable => serializer.serialize_str("not_applicable"),
        }
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Unbounded => f.write_str("unbounded"),
            Self::NotApplicable => f.write_str("not applicable"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Cost breakdown for a single request against one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenCost {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Dollar cost of `tokens` at `rate_per_million`, rounded to 4 places.
pub fn token_cost(tokens: u64, rate_per_million: f64) -> f64 {
    round4(tokens as f64 / TOKENS_PER_RATE_UNIT * rate_per_million)
}

/// Input and output costs are rounded individually, then summed and rounded
/// again so `total == input + output` holds at 4 decimal places.
pub fn token_cost_breakdown(
    input_tokens: u64,
    output_tokens: u64,
    input_per_million: f64,
    output_per_million: f64,
) -> TokenCost {
    let input_cost = token_cost(input_tokens, input_per_million);
    let output_cost = token_cost(output_tokens, output_per_million);
    TokenCost {
        input_cost,
        output_cost,
        total_cost: round4(input_cost + output_cost),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compute
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComputeCost {
    pub hourly: f64,
    pub monthly: f64,
    pub yearly: f64,
}

/// Hourly rate → monthly → yearly for `count` identical instances.
pub fn compute_cost(hourly_rate: f64, hours_per_month: f64, count: u32) -> ComputeCost {
    let hourly = hourly_rate * f64::from(count);
    let monthly = hourly * hours_per_month;
    ComputeCost {
        hourly: round4(hourly),
        monthly: round2(monthly),
        yearly: round2(monthly * 12.0),
    }
}

/// Savings from a committed-use discount on an on-demand monthly cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReservedSavings {
    pub discount: f64,
    pub reserved_monthly: f64,
    pub monthly_savings: f64,
    pub yearly_savings: f64,
}

pub fn reserved_savings(on_demand_monthly: f64, discount: f64) -> ReservedSavings {
    let reserved = on_demand_monthly * (1.0 - discount);
    let savings = on_demand_monthly - reserved;
    ReservedSavings {
        discount,
        reserved_monthly: round2(reserved),
        monthly_savings: round2(savings),
        yearly_savings: round2(savings * 12.0),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tiered billing
// ─────────────────────────────────────────────────────────────────────────────

/// One band of a tiered price list. `up_to_gb` is the cumulative upper bound;
/// `None` means the tier is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BandwidthTier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to_gb: Option<f64>,
    pub per_gb: f64,
}

/// The portion of a transfer billed within a single tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCharge {
    pub tier: usize,
    pub gb: f64,
    pub rate: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredCost {
    pub breakdown: Vec<TierCharge>,
    pub total_cost: f64,
    /// Set when the transfer exceeded every bounded tier and the remainder
    /// was billed at the last tier's rate.
    pub extended_last_tier: bool,
}

/// Returns the index of the first tier whose bound does not strictly exceed
/// its predecessor's, if any. Only the last tier may be unbounded.
pub fn first_misordered_tier(tiers: &[BandwidthTier]) -> Option<usize> {
    let mut previous = 0.0;
    for (idx, tier) in tiers.iter().enumerate() {
        match tier.up_to_gb {
            Some(limit) if limit > previous => previous = limit,
            None if idx == tiers.len() - 1 => {}
            _ => return Some(idx),
        }
    }
    None
}

/// Allocate `gb` into ascending cumulative tiers, filling each tier's
/// remaining capacity before spilling into the next.
///
/// Tiers must be ordered (see [`first_misordered_tier`]).
pub fn tiered_cost(tiers: &[BandwidthTier], gb: f64) -> TieredCost {
    let mut breakdown = Vec::new();
    let mut remaining = gb.max(0.0);
    let mut lower = 0.0;

    for (idx, tier) in tiers.iter().enumerate() {
        if remaining <= 0.0 {
            break;
        }
        let capacity = tier.up_to_gb.map(|upper| upper - lower);
        let allocated = capacity.map_or(remaining, |cap| remaining.min(cap));
        breakdown.push(TierCharge {
            tier: idx,
            gb: allocated,
            rate: tier.per_gb,
            cost: round2(allocated * tier.per_gb),
        });
        remaining -= allocated;
        if let Some(upper) = tier.up_to_gb {
            lower = upper;
        }
    }

    let mut extended_last_tier = false;
    if remaining > 0.0
        && let Some(last) = tiers.last()
    {
        extended_last_tier = true;
        match breakdown.last_mut() {
            Some(charge) if charge.tier == tiers.len() - 1 => {
                charge.gb += remaining;
                charge.cost = round2(charge.gb * charge.rate);
            }
            _ => breakdown.push(TierCharge {
                tier: tiers.len() - 1,
                gb: remaining,
                rate: last.per_gb,
                cost: round2(remaining * last.per_gb),
            }),
        }
    }

    let total_cost = round2(breakdown.iter().map(|c| c.cost).sum());
    TieredCost {
        breakdown,
        total_cost,
        extended_last_tier,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Growth, runway, break-even
// ─────────────────────────────────────────────────────────────────────────────

/// `base × (1 + growth_rate)^i` for `i` in `1..=months`.
pub fn compound_series(base: f64, growth_rate: f64, months: u32) -> Vec<f64> {
    (1..=months)
        .map(|i| base * (1.0 + growth_rate).powi(i as i32))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Runway {
    pub net_burn: f64,
    pub runway_months: Measure,
}

/// Months of cash left at the current net burn. Revenue that covers costs
/// gives an unbounded runway rather than an error.
pub fn runway(cash_in_bank: f64, monthly_cost: f64, monthly_revenue: f64) -> Runway {
    let net_burn = monthly_cost - monthly_revenue;
    let runway_months = if net_burn <= 0.0 {
        Measure::Unbounded
    } else {
        Measure::ratio(cash_in_bank.max(0.0), net_burn).map(round1)
    };
    Runway {
        net_burn: round2(net_burn),
        runway_months,
    }
}

/// Net burn divided by net new ARR. Undefined when no ARR was added.
pub fn burn_multiple(net_burn: f64, net_new_arr: f64) -> Measure {
    if net_new_arr <= 0.0 {
        return Measure::NotApplicable;
    }
    Measure::ratio(net_burn, net_new_arr).map(round2)
}

/// Where two (upfront, monthly) cost curves meet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossover {
    /// Monthly costs are identical; only the upfront difference matters.
    Immediate,
    /// Curves cross after this many months.
    AfterMonths(f64),
    /// The crossover point lies in the past; the curves never meet.
    Never,
}

const MONTHLY_EPSILON: f64 = 1e-9;

pub fn break_even(upfront_a: f64, monthly_a: f64, upfront_b: f64, monthly_b: f64) -> Crossover {
    let monthly_delta = monthly_a - monthly_b;
    if monthly_delta.abs() < MONTHLY_EPSILON {
        return Crossover::Immediate;
    }
    let months = (upfront_b - upfront_a) / monthly_delta;
    if months < 0.0 || !months.is_finite() {
        Crossover::Never
    } else {
        Crossover::AfterMonths(months)
    }
}
