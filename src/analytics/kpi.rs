//! Headline KPI tiles

use std::collections::HashSet;

use serde::Serialize;

use super::mean;
use crate::models::Property;

/// One label/value tile next to the map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiTile {
    pub label: &'static str,
    pub value: String,
}

/// Group the digits of a non-negative integer in thousands: `1234567` → `1,234,567`
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[must_use]
pub fn format_count(count: usize) -> String {
    group_thousands(&count.to_string())
}

/// Whole pounds with thousands separators, rounding halves to even.
/// A missing value renders as `n/a`.
#[must_use]
pub fn format_money(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => {
            let rounded = v.round_ties_even();
            let sign = if rounded < 0.0 { "-" } else { "" };
            format!("£{sign}{}", group_thousands(&format!("{:.0}", rounded.abs())))
        }
        None => "n/a".to_string(),
    }
}

/// Pounds and pence with thousands separators: `£12,345.68`
#[must_use]
pub fn format_money_pence(value: f64) -> String {
    let text = format!("{:.2}", value.abs());
    let (whole, pence) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if value < 0.0 && text != "0.00" { "-" } else { "" };
    format!("£{sign}{}.{pence}", group_thousands(whole))
}

/// The four headline tiles over the filtered rows
#[must_use]
pub fn kpi_tiles(rows: &[&Property]) -> Vec<KpiTile> {
    let distinct: HashSet<&str> = rows.iter().map(|p| p.full_address.as_str()).collect();

    vec![
        KpiTile {
            label: "Total Properties",
            value: format_count(distinct.len()),
        },
        KpiTile {
            label: "Avg. Historical Sale Price",
            value: format_money(mean(rows.iter().filter_map(|p| p.history_price))),
        },
        KpiTile {
            label: "Avg. Estimated Sale Price",
            value: format_money(mean(rows.iter().filter_map(|p| p.sale_estimate_current_price))),
        },
        KpiTile {
            label: "Avg. Price per m²",
            value: format_money(mean(rows.iter().filter_map(|p| p.price_per_sqm()))),
        },
    ]
}
