//! Borough leaderboard by average estimated sale price

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::kpi::format_money;
use super::mean;
use crate::models::Property;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    /// 🥇 🥈 🥉 for the podium, `4.`, `5.`, ... below it
    pub badge: String,
    pub borough: String,
    pub avg_price: f64,
    pub avg_price_label: String,
    /// Percentage above (or below) the average of all filtered rows
    pub vs_overall: f64,
    pub delta_label: String,
    pub delta_class: &'static str,
}

fn rank_badge(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("{n}."),
    }
}

/// Boroughs ordered by mean estimated price, most expensive first
#[must_use]
pub fn leaderboard(rows: &[&Property]) -> Vec<LeaderboardEntry> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for property in rows {
        if let (Some(borough), Some(price)) = (property.borough.as_deref(), property.sale_estimate_current_price) {
            let entry = sums.entry(borough).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
    }

    let Some(overall) = mean(rows.iter().filter_map(|p| p.sale_estimate_current_price)) else {
        return Vec::new();
    };

    let mut averages: Vec<(&str, f64)> = sums
        .into_iter()
        .map(|(borough, (sum, n))| (borough, sum / n as f64))
        .collect();
    averages.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    averages
        .into_iter()
        .enumerate()
        .map(|(i, (borough, avg_price))| {
            let vs_overall = (avg_price - overall) / overall * 100.0;
            let positive = vs_overall > 0.0;
            LeaderboardEntry {
                rank: i + 1,
                badge: rank_badge(i + 1),
                borough: borough.to_string(),
                avg_price,
                avg_price_label: format_money(Some(avg_price)),
                vs_overall,
                delta_label: if positive {
                    format!("(+{vs_overall:.1}%)")
                } else {
                    format!("({vs_overall:.1}%)")
                },
                delta_class: if positive {
                    "leaderboard-delta-positive"
                } else {
                    "leaderboard-delta-negative"
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(borough: Option<&str>, price: Option<f64>) -> Property {
        Property {
            borough: borough.map(str::to_string),
            sale_estimate_current_price: price,
            ..Default::default()
        }
    }

    #[test]
    fn test_ranking_and_deltas() {
        let rows = [
            row(Some("Camden"), Some(900_000.0)),
            row(Some("Hackney"), Some(500_000.0)),
            row(Some("Hackney"), Some(700_000.0)),
            row(Some("Barnet"), Some(400_000.0)),
            row(Some("Bexley"), Some(300_000.0)),
            row(None, Some(200_000.0)),
            row(Some("Camden"), None),
        ];
        let refs: Vec<&Property> = rows.iter().collect();
        let board = leaderboard(&refs);

        let boroughs: Vec<&str> = board.iter().map(|e| e.borough.as_str()).collect();
        assert_eq!(boroughs, vec!["Camden", "Hackney", "Barnet", "Bexley"]);
        let badges: Vec<&str> = board.iter().map(|e| e.badge.as_str()).collect();
        assert_eq!(badges, vec!["🥇", "🥈", "🥉", "4."]);

        // overall mean includes the row without a borough: 3,000,000 / 6
        assert!((board[0].vs_overall - 80.0).abs() < 1e-9);
        assert_eq!(board[0].delta_label, "(+80.0%)");
        assert_eq!(board[0].delta_class, "leaderboard-delta-positive");
        assert_eq!(board[1].delta_label, "(+20.0%)");
        assert_eq!(board[2].delta_label, "(-20.0%)");
        assert_eq!(board[3].delta_class, "leaderboard-delta-negative");
        assert_eq!(board[0].avg_price_label, "£900,000");
    }

    #[test]
    fn test_equal_to_overall_is_not_positive() {
        let rows = [row(Some("Camden"), Some(500_000.0))];
        let refs: Vec<&Property> = rows.iter().collect();
        let board = leaderboard(&refs);
        assert_eq!(board[0].delta_label, "(0.0%)");
        assert_eq!(board[0].delta_class, "leaderboard-delta-negative");
    }

    #[test]
    fn test_empty() {
        assert!(leaderboard(&[]).is_empty());
    }
}
