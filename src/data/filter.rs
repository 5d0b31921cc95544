//! Sidebar filters: borough selection and history date range

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::loader::Dataset;
use crate::models::Property;
use crate::{HousingError, Result};

/// Filter state shared by every dashboard section.
///
/// An empty borough list selects every borough. Open date bounds fall back
/// to the dataset's earliest and latest history date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    #[serde(default)]
    pub boroughs: Vec<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl DashboardFilter {
    pub fn new(boroughs: Vec<String>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        let filter = Self { boroughs, from, to };
        filter.validate()?;
        Ok(filter)
    }

    /// Parse the comma-separated borough list used by the query string
    #[must_use]
    pub fn parse_boroughs(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(HousingError::validation(format!(
                    "Start date {from} is after end date {to}"
                )));
            }
        }
        Ok(())
    }

    /// Back to every borough over the full date range
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Whether a single row passes the filter. Rows without a history date
    /// never do.
    #[must_use]
    pub fn matches(&self, property: &Property) -> bool {
        let Some(date) = property.history_date else {
            return false;
        };
        if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
            return false;
        }
        self.boroughs.is_empty()
            || property
                .borough
                .as_ref()
                .is_some_and(|b| self.boroughs.contains(b))
    }

    /// Rows of `dataset` passing the filter, in dataset order
    #[must_use]
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a Property> {
        dataset
            .properties()
            .iter()
            .filter(|p| self.matches(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset() -> Dataset {
        let row = |address: &str, borough: Option<&str>, day: Option<NaiveDate>| Property {
            full_address: address.to_string(),
            borough: borough.map(str::to_string),
            history_date: day,
            ..Default::default()
        };
        Dataset::from_properties(vec![
            row("a", Some("Camden"), Some(date(2018, 1, 1))),
            row("b", Some("Hackney"), Some(date(2019, 6, 30))),
            row("c", None, Some(date(2020, 1, 1))),
            row("d", Some("Camden"), None),
        ])
    }

    fn addresses(rows: &[&Property]) -> Vec<String> {
        rows.iter().map(|p| p.full_address.clone()).collect()
    }

    #[test]
    fn test_default_keeps_every_dated_row() {
        let dataset = dataset();
        let rows = DashboardFilter::default().apply(&dataset);
        assert_eq!(addresses(&rows), vec!["a", "b", "c"]);
    }

    #[rstest]
    #[case(Some(date(2019, 6, 30)), None, vec!["b", "c"])]
    #[case(None, Some(date(2019, 6, 30)), vec!["a", "b"])]
    #[case(Some(date(2018, 1, 2)), Some(date(2019, 12, 31)), vec!["b"])]
    fn test_date_range_is_inclusive(
        #[case] from: Option<NaiveDate>,
        #[case] to: Option<NaiveDate>,
        #[case] expected: Vec<&str>,
    ) {
        let dataset = dataset();
        let filter = DashboardFilter::new(vec![], from, to).unwrap();
        assert_eq!(addresses(&filter.apply(&dataset)), expected);
    }

    #[test]
    fn test_borough_selection() {
        let dataset = dataset();
        let filter = DashboardFilter::new(vec!["Camden".into()], None, None).unwrap();
        assert_eq!(addresses(&filter.apply(&dataset)), vec!["a"]);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let result = DashboardFilter::new(vec![], Some(date(2020, 1, 1)), Some(date(2019, 1, 1)));
        assert!(matches!(result, Err(HousingError::Validation { .. })));
    }

    #[test]
    fn test_reset() {
        let mut filter =
            DashboardFilter::new(vec!["Camden".into()], Some(date(2019, 1, 1)), None).unwrap();
        assert!(!filter.is_default());
        filter.reset();
        assert!(filter.is_default());
    }

    #[test]
    fn test_parse_boroughs() {
        assert_eq!(
            DashboardFilter::parse_boroughs(" Camden, ,Hackney "),
            vec!["Camden".to_string(), "Hackney".to_string()]
        );
        assert!(DashboardFilter::parse_boroughs("").is_empty());
    }
}
