//! Return-on-investment projection from historical borough growth

use serde::{Deserialize, Serialize};

use crate::analytics::format_money;
use crate::analytics::trends::{Frequency, bucket_means};
use crate::models::Property;
use crate::{HousingError, Result};

/// Used when a borough has too little history to estimate growth
pub const FALLBACK_GROWTH_RATE: f64 = 3.0;
pub const MAX_GROWTH_RATE: f64 = 15.0;
pub const MIN_PURCHASE_PRICE: f64 = 50_000.0;
pub const HOLD_PERIODS: [u32; 4] = [1, 3, 5, 10];

/// Suggested annual growth for the rate slider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthSuggestion {
    pub borough: String,
    /// Unrounded historical rate, `FALLBACK_GROWTH_RATE` without history
    pub historical_rate: f64,
    /// Rounded to one decimal and clamped to the slider range
    pub suggested_rate: f64,
    /// Number of month-end points the rate was derived from
    pub months: usize,
    pub slider_min: f64,
    pub slider_max: f64,
}

/// Compound annual growth of the month-end mean history price
#[must_use]
pub fn historical_growth(rows: &[&Property], borough: &str) -> GrowthSuggestion {
    let monthly = bucket_means(
        rows.iter()
            .filter(|p| p.in_borough(borough))
            .filter_map(|p| Some((p.history_date?, p.history_price?))),
        Frequency::Monthly,
    );

    let rate = match (monthly.first(), monthly.last()) {
        (Some(first), Some(last)) if monthly.len() >= 2 => {
            let years = (last.date - first.date).num_days() as f64 / 365.0;
            ((last.value / first.value).powf(1.0 / years) - 1.0) * 100.0
        }
        _ => FALLBACK_GROWTH_RATE,
    };
    let rate = if rate.is_finite() { rate } else { FALLBACK_GROWTH_RATE };

    GrowthSuggestion {
        borough: borough.to_string(),
        historical_rate: rate,
        suggested_rate: ((rate * 10.0).round() / 10.0).clamp(0.0, MAX_GROWTH_RATE),
        months: monthly.len(),
        slider_min: 0.0,
        slider_max: MAX_GROWTH_RATE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiInput {
    #[serde(default = "default_purchase_price")]
    pub purchase_price: f64,
    #[serde(default = "default_hold_years")]
    pub hold_years: u32,
    #[serde(default = "default_annual_rate")]
    pub annual_rate: f64,
}

fn default_purchase_price() -> f64 {
    750_000.0
}

fn default_hold_years() -> u32 {
    5
}

fn default_annual_rate() -> f64 {
    FALLBACK_GROWTH_RATE
}

impl Default for RoiInput {
    fn default() -> Self {
        Self {
            purchase_price: default_purchase_price(),
            hold_years: default_hold_years(),
            annual_rate: default_annual_rate(),
        }
    }
}

impl RoiInput {
    pub fn validate(&self) -> Result<()> {
        if !(self.purchase_price >= MIN_PURCHASE_PRICE) || !self.purchase_price.is_finite() {
            return Err(HousingError::validation("Purchase price must be at least £50,000"));
        }
        if !HOLD_PERIODS.contains(&self.hold_years) {
            return Err(HousingError::validation("Hold period must be 1, 3, 5 or 10 years"));
        }
        if !(0.0..=MAX_GROWTH_RATE).contains(&self.annual_rate) {
            return Err(HousingError::validation("Annual growth rate must be between 0% and 15%"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiResult {
    pub future_value: f64,
    pub roi_percent: f64,
    /// `Projected Future Value: £1,234,567`
    pub future_value_label: String,
    /// `ROI after 5 years: 27.63%`
    pub roi_label: String,
}

/// Compound the purchase price over the hold period
pub fn calculate(input: &RoiInput) -> Result<RoiResult> {
    input.validate()?;
    let growth = 1.0 + input.annual_rate / 100.0;
    let future_value = input.purchase_price * growth.powi(input.hold_years as i32);
    let roi_percent = (future_value - input.purchase_price) / input.purchase_price * 100.0;
    Ok(RoiResult {
        future_value,
        roi_percent,
        future_value_label: format!("Projected Future Value: {}", format_money(Some(future_value))),
        roi_label: format!("ROI after {} years: {roi_percent:.2}%", input.hold_years),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn sale(borough: &str, date: &str, price: f64) -> Property {
        Property {
            full_address: format!("{borough} {date}"),
            borough: Some(borough.into()),
            history_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            history_price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_projection() {
        let input = RoiInput {
            annual_rate: 5.0,
            ..RoiInput::default()
        };
        let result = calculate(&input).unwrap();
        assert!((result.future_value - 957_211.171_875).abs() < 1e-6);
        assert_eq!(result.future_value_label, "Projected Future Value: £957,211");
        assert_eq!(result.roi_label, "ROI after 5 years: 27.63%");
    }

    #[rstest]
    #[case(RoiInput { purchase_price: 49_999.0, ..RoiInput::default() })]
    #[case(RoiInput { purchase_price: f64::NAN, ..RoiInput::default() })]
    #[case(RoiInput { hold_years: 2, ..RoiInput::default() })]
    #[case(RoiInput { annual_rate: 15.5, ..RoiInput::default() })]
    #[case(RoiInput { annual_rate: -1.0, ..RoiInput::default() })]
    fn test_rejects_out_of_range(#[case] input: RoiInput) {
        assert!(matches!(calculate(&input), Err(HousingError::Validation { .. })));
    }

    #[test]
    fn test_zero_rate_means_zero_roi() {
        let result = calculate(&RoiInput {
            annual_rate: 0.0,
            hold_years: 10,
            ..RoiInput::default()
        })
        .unwrap();
        assert_eq!(result.future_value, 750_000.0);
        assert_eq!(result.roi_label, "ROI after 10 years: 0.00%");
    }

    #[test]
    fn test_historical_growth_from_month_ends() {
        // month ends 2020-01-31 and 2021-01-31 are 366 days apart
        let rows = [
            sale("Camden", "2020-01-05", 400_000.0),
            sale("Camden", "2020-01-20", 600_000.0),
            sale("Camden", "2021-01-10", 550_000.0),
            sale("Hackney", "2021-01-10", 10.0),
        ];
        let refs: Vec<&Property> = rows.iter().collect();
        let growth = historical_growth(&refs, "Camden");
        let expected = (1.1_f64.powf(365.0 / 366.0) - 1.0) * 100.0;
        assert!((growth.historical_rate - expected).abs() < 1e-9);
        assert_eq!(growth.suggested_rate, 10.0);
        assert_eq!(growth.months, 2);
    }

    #[test]
    fn test_growth_falls_back_without_history() {
        let rows = [sale("Camden", "2020-01-05", 400_000.0)];
        let refs: Vec<&Property> = rows.iter().collect();
        assert_eq!(historical_growth(&refs, "Camden").suggested_rate, FALLBACK_GROWTH_RATE);
        assert_eq!(historical_growth(&refs, "Bexley").months, 0);
    }

    #[test]
    fn test_growth_is_clamped() {
        let rows = [
            sale("Camden", "2020-01-05", 100_000.0),
            sale("Camden", "2021-01-05", 900_000.0),
        ];
        let refs: Vec<&Property> = rows.iter().collect();
        let growth = historical_growth(&refs, "Camden");
        assert!(growth.historical_rate > MAX_GROWTH_RATE);
        assert_eq!(growth.suggested_rate, MAX_GROWTH_RATE);
    }
}
