//! Market analytics over the filtered rows
//!
//! Every function here takes the rows that passed the sidebar filter and
//! returns plain serializable values for the front end and the CLI report.

pub mod distribution;
pub mod kpi;
pub mod leaderboard;
pub mod overview;
pub mod properties;
pub mod trends;

pub use distribution::{Distributions, Histogram, HistogramBin, TypeShare, distributions};
pub use kpi::{KpiTile, format_count, format_money, format_money_pence, kpi_tiles};
pub use leaderboard::{LeaderboardEntry, leaderboard};
pub use overview::{MarketOverview, market_overview};
pub use properties::{PropertyDetails, TopProperty, property_details, top_properties};
pub use trends::{ChartSpec, Frequency, TrendPoint, TrendSeries, Trends, price_trends};

/// Arithmetic mean, `None` for no values
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean([1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(mean(std::iter::empty()), None);
    }
}
