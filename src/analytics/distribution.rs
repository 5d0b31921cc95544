//! Property type shares and value histograms

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Property;

pub const PIE_PALETTE: [&str; 5] = ["#e6d4b7", "#d4a373", "#b47b5a", "#8f5e3b", "#f3ede5"];
pub const PIE_HOLE: f64 = 0.4;
pub const BAR_COLOR: &str = "#d4a373";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    pub property_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub title: &'static str,
    pub x_label: &'static str,
    pub color: &'static str,
    pub bins: Vec<HistogramBin>,
    /// Shown instead of the chart when the column has no values
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distributions {
    pub property_types: Vec<TypeShare>,
    pub palette: [&'static str; 5],
    pub hole: f64,
    pub type_message: Option<String>,
    pub price: Histogram,
    pub bedrooms: Histogram,
    pub bathrooms: Histogram,
}

/// Row counts per property type, most common first, ties by name
#[must_use]
pub fn property_type_counts(rows: &[&Property]) -> Vec<TypeShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for p in rows {
        if let Some(t) = p.property_type.as_deref() {
            *counts.entry(t).or_default() += 1;
        }
    }
    let mut shares: Vec<TypeShare> = counts
        .into_iter()
        .map(|(t, count)| TypeShare {
            property_type: t.to_string(),
            count,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.property_type.cmp(&b.property_type)));
    shares
}

/// `bins` equal-width bins spanning the smallest to the largest value.
/// The last bin includes the maximum.
#[must_use]
pub fn equal_width_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            start: min + width * i as f64,
            end: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for &v in values {
        let index = (((v - min) / width) as usize).min(bins - 1);
        result[index].count += 1;
    }
    result
}

fn column(rows: &[&Property], value: fn(&Property) -> Option<f64>) -> Vec<f64> {
    rows.iter().filter_map(|p| value(p)).collect()
}

fn histogram(
    values: Vec<f64>,
    bins: usize,
    title: &'static str,
    x_label: &'static str,
    empty_message: String,
) -> Histogram {
    let message = values.is_empty().then_some(empty_message);
    Histogram {
        title,
        x_label,
        color: BAR_COLOR,
        bins: equal_width_bins(&values, bins),
        message,
    }
}

/// Pie chart and histogram data for the market overview
#[must_use]
pub fn distributions(rows: &[&Property]) -> Distributions {
    let property_types = property_type_counts(rows);
    let type_message = property_types
        .is_empty()
        .then(|| "No property type data available.".to_string());

    Distributions {
        property_types,
        palette: PIE_PALETTE,
        hole: PIE_HOLE,
        type_message,
        price: histogram(
            column(rows, |p| p.sale_estimate_current_price),
            15,
            "Estimated Sale Price Distribution",
            "Price (£)",
            "No price data available.".to_string(),
        ),
        bedrooms: histogram(
            column(rows, |p| p.bedrooms),
            10,
            "Number of Bedrooms",
            "Bedrooms",
            "No bedrooms data available.".to_string(),
        ),
        bathrooms: histogram(
            column(rows, |p| p.bathrooms),
            10,
            "Number of Bathrooms",
            "Bathrooms",
            "No bathrooms data available.".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_counts_order() {
        let rows: Vec<Property> = ["Flat", "House", "Flat", "Bungalow", "House", "Flat"]
            .iter()
            .map(|t| Property {
                property_type: Some((*t).to_string()),
                ..Default::default()
            })
            .chain(std::iter::once(Property::default()))
            .collect();
        let refs: Vec<&Property> = rows.iter().collect();

        let counts = property_type_counts(&refs);
        let pairs: Vec<(&str, usize)> = counts.iter().map(|s| (s.property_type.as_str(), s.count)).collect();
        assert_eq!(pairs, vec![("Flat", 3), ("House", 2), ("Bungalow", 1)]);
    }

    #[test]
    fn test_equal_width_bins() {
        let bins = equal_width_bins(&[0.0, 1.0, 2.5, 5.0, 10.0], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![2, 1, 1, 1]);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[3].end, 10.0);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_single_value_bins() {
        let bins = equal_width_bins(&[3.0, 3.0], 10);
        assert_eq!(bins, vec![HistogramBin { start: 3.0, end: 3.0, count: 2 }]);
    }

    #[test]
    fn test_empty_columns_carry_messages() {
        let rows = [Property {
            bedrooms: Some(2.0),
            ..Default::default()
        }];
        let refs: Vec<&Property> = rows.iter().collect();
        let d = distributions(&refs);

        assert_eq!(d.price.message.as_deref(), Some("No price data available."));
        assert!(d.price.bins.is_empty());
        assert_eq!(d.bathrooms.message.as_deref(), Some("No bathrooms data available."));
        assert_eq!(d.bedrooms.message, None);
        assert_eq!(d.bedrooms.bins.len(), 1);
        assert_eq!(d.type_message.as_deref(), Some("No property type data available."));
        assert_eq!(d.palette[1], BAR_COLOR);
    }
}
