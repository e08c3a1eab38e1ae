//! Cash runway and burn multiple.

use chrono::{Days, Months, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ResolveError;
use crate::{
    formulas::{Measure, burn_multiple, runway},
    insights::{self, Insight},
};

/// Average days per month, for turning fractional months into a date.
const DAYS_PER_MONTH: f64 = 30.4375;

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunwayRequest {
    #[validate(range(min = 0.0))]
    pub cash_in_bank: f64,

    #[validate(range(min = 0.0))]
    pub monthly_costs: f64,

    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub monthly_revenue: f64,

    /// Net new annual recurring revenue added per month, for the burn multiple
    #[serde(default)]
    pub net_new_arr: Option<f64>,

    /// Date the cash balance applies to (defaults to today, UTC)
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunwayResult {
    pub net_burn: f64,
    pub runway_months: Measure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_multiple: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_out_date: Option<NaiveDate>,
    pub insights: Vec<Insight>,
}

fn cash_out_date(as_of: NaiveDate, months: f64) -> Option<NaiveDate> {
    let whole = months.trunc();
    let days = ((months - whole) * DAYS_PER_MONTH).round();
    as_of
        .checked_add_months(Months::new(u32::try_from(whole as i64).ok()?))?
        .checked_add_days(Days::new(days as u64))
}

pub fn calculate_runway(request: &RunwayRequest) -> Result<RunwayResult, ResolveError> {
    let result = runway(
        request.cash_in_bank,
        request.monthly_costs,
        request.monthly_revenue,
    );
    let multiple = request
        .net_new_arr
        .map(|arr| burn_multiple(result.net_burn, arr));

    let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let cash_out = result
        .runway_months
        .value()
        .and_then(|months| cash_out_date(as_of, months));

    let mut insights = Vec::new();
    insights.extend(insights::runway(result.runway_months));
    insights.extend(multiple.and_then(insights::burn_multiple));

    Ok(RunwayResult {
        net_burn: result.net_burn,
        runway_months: result.runway_months,
        burn_multiple: multiple,
        cash_out_date: cash_out,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightKind;

    fn request(cash: f64, costs: f64, revenue: f64) -> RunwayRequest {
        RunwayRequest {
            cash_in_bank: cash,
            monthly_costs: costs,
            monthly_revenue: revenue,
            net_new_arr: None,
            as_of: NaiveDate::from_ymd_opt(2025, 1, 15),
        }
    }

    #[test]
    fn test_runway_forty_months() {
        let result = calculate_runway(&request(200_000.0, 10_000.0, 5_000.0)).unwrap();
        assert_eq!(result.runway_months, Measure::Value(40.0));
        assert_eq!(result.cash_out_date, NaiveDate::from_ymd_opt(2028, 5, 15));
        assert!(result.insights.is_empty());
    }

    #[test]
    fn test_profitable_runway_is_unbounded() {
        let result = calculate_runway(&request(10_000.0, 5_000.0, 6_000.0)).unwrap();
        assert_eq!(result.runway_months, Measure::Unbounded);
        assert_eq!(result.cash_out_date, None);
        assert_eq!(result.insights[0].kind, InsightKind::Prediction);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["runway_months"], "unbounded");
    }

    #[test]
    fn test_short_runway_warning() {
        let result = calculate_runway(&request(50_000.0, 15_000.0, 0.0)).unwrap();
        assert_eq!(result.runway_months, Measure::Value(3.3));
        assert_eq!(result.insights[0].kind, InsightKind::Warning);
    }

    #[test]
    fn test_burn_multiple() {
        let mut req = request(500_000.0, 60_000.0, 10_000.0);
        req.net_new_arr = Some(20_000.0);
        let result = calculate_runway(&req).unwrap();
        assert_eq!(result.burn_multiple, Some(Measure::Value(2.5)));
        assert!(result.insights.iter().any(|i| i.kind == InsightKind::Warning));

        req.net_new_arr = Some(0.0);
        let result = calculate_runway(&req).unwrap();
        assert_eq!(result.burn_multiple, Some(Measure::NotApplicable));
    }
}
