//! Market overview: the sections below the map, assembled in one call

use serde::Serialize;

use super::distribution::{Distributions, distributions};
use super::leaderboard::{LeaderboardEntry, leaderboard};
use super::properties::{TOP_PROPERTY_COUNT, TopProperty, top_properties};
use super::trends::{Frequency, Trends, price_trends};
use crate::models::Property;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOverview {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub top_properties: Vec<TopProperty>,
    pub trends: Trends,
    pub distributions: Distributions,
}

#[must_use]
pub fn market_overview(rows: &[&Property], frequency: Frequency, google_key: Option<&str>) -> MarketOverview {
    MarketOverview {
        leaderboard: leaderboard(rows),
        top_properties: top_properties(rows, TOP_PROPERTY_COUNT, google_key),
        trends: price_trends(rows, frequency),
        distributions: distributions(rows),
    }
}
