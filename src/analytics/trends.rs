//! Price trends over time

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Property;
use crate::{HousingError, Result};

/// Time aggregation of the trend charts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 3] = [Frequency::Monthly, Frequency::Quarterly, Frequency::Yearly];

    /// Last day of the period containing `date`
    #[must_use]
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        let (year, last_month) = match self {
            Frequency::Monthly => (date.year(), date.month()),
            Frequency::Quarterly => (date.year(), date.month().div_ceil(3) * 3),
            Frequency::Yearly => (date.year(), 12),
        };
        month_end(year, last_month).unwrap_or(date)
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
            Frequency::Yearly => "Yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for Frequency {
    type Err = HousingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "m" => Ok(Frequency::Monthly),
            "quarterly" | "q" => Ok(Frequency::Quarterly),
            "yearly" | "y" => Ok(Frequency::Yearly),
            _ => Err(HousingError::validation(format!("Unknown frequency: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Line chart presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: &'static str,
    pub x_title: &'static str,
    pub y_title: &'static str,
    pub color: &'static str,
    pub height: u32,
}

const PRICE_CHART: ChartSpec = ChartSpec {
    title: "Avg. Historical Prices",
    x_title: "Date",
    y_title: "£",
    color: "black",
    height: 350,
};

const CHANGE_CHART: ChartSpec = ChartSpec {
    title: "Avg. % Price Change",
    x_title: "Date",
    y_title: "%",
    color: "darkred",
    height: 350,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub chart: ChartSpec,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub frequency: Frequency,
    pub price: TrendSeries,
    pub percentage_change: TrendSeries,
}

/// Mean value per period; periods without values are left out
#[must_use]
pub fn bucket_means(
    samples: impl IntoIterator<Item = (NaiveDate, f64)>,
    frequency: Frequency,
) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in samples {
        let entry = buckets.entry(frequency.period_end(date)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(date, (sum, n))| TrendPoint {
            date,
            value: sum / n as f64,
        })
        .collect()
}

/// Historical price and estimate-change trends for the filtered rows
#[must_use]
pub fn price_trends(rows: &[&Property], frequency: Frequency) -> Trends {
    let prices = rows
        .iter()
        .filter_map(|p| Some((p.history_date?, p.history_price?)));
    let changes = rows
        .iter()
        .filter_map(|p| Some((p.value_change_sale_date?, p.value_change_percentage?)));

    Trends {
        frequency,
        price: TrendSeries {
            chart: PRICE_CHART,
            points: bucket_means(prices, frequency),
        },
        percentage_change: TrendSeries {
            chart: CHANGE_CHART,
            points: bucket_means(changes, frequency),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(Frequency::Monthly, date(2024, 2, 10), date(2024, 2, 29))]
    #[case(Frequency::Monthly, date(2023, 12, 1), date(2023, 12, 31))]
    #[case(Frequency::Quarterly, date(2024, 1, 1), date(2024, 3, 31))]
    #[case(Frequency::Quarterly, date(2024, 5, 15), date(2024, 6, 30))]
    #[case(Frequency::Quarterly, date(2024, 12, 31), date(2024, 12, 31))]
    #[case(Frequency::Yearly, date(2019, 7, 4), date(2019, 12, 31))]
    fn test_period_end(#[case] frequency: Frequency, #[case] day: NaiveDate, #[case] expected: NaiveDate) {
        assert_eq!(frequency.period_end(day), expected);
    }

    #[rstest]
    #[case("Monthly", Frequency::Monthly)]
    #[case("q", Frequency::Quarterly)]
    #[case(" YEARLY ", Frequency::Yearly)]
    fn test_parse_frequency(#[case] text: &str, #[case] expected: Frequency) {
        assert_eq!(text.parse::<Frequency>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_frequency() {
        assert!("weekly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_price_trends() {
        let rows = [
            Property {
                history_date: Some(date(2020, 1, 5)),
                history_price: Some(100.0),
                value_change_sale_date: Some(date(2020, 2, 1)),
                value_change_percentage: Some(4.0),
                ..Default::default()
            },
            Property {
                history_date: Some(date(2020, 1, 25)),
                history_price: Some(300.0),
                value_change_sale_date: Some(date(2020, 2, 1)),
                ..Default::default()
            },
            Property {
                history_date: Some(date(2020, 4, 1)),
                history_price: Some(50.0),
                ..Default::default()
            },
        ];
        let refs: Vec<&Property> = rows.iter().collect();

        let monthly = price_trends(&refs, Frequency::Monthly);
        assert_eq!(
            monthly.price.points,
            vec![
                TrendPoint { date: date(2020, 1, 31), value: 200.0 },
                TrendPoint { date: date(2020, 4, 30), value: 50.0 },
            ]
        );
        assert_eq!(
            monthly.percentage_change.points,
            vec![TrendPoint { date: date(2020, 2, 29), value: 4.0 }]
        );
        assert_eq!(monthly.price.chart.title, "Avg. Historical Prices");
        assert_eq!(monthly.percentage_change.chart.color, "darkred");

        let yearly = price_trends(&refs, Frequency::Yearly);
        assert_eq!(yearly.price.points, vec![TrendPoint { date: date(2020, 12, 31), value: 150.0 }]);
    }
}
