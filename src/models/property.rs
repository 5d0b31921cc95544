//! Cleaned property record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Location;

/// One row of the cleaned dataset: a property together with one entry of
/// its sale history and the latest sale estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Position in the cleaned dataset, stable for the lifetime of a `Dataset`
    pub id: usize,
    pub full_address: String,
    pub postcode: Option<String>,
    pub outcode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bathrooms: Option<f64>,
    pub bedrooms: Option<f64>,
    pub floor_area_sqm: Option<f64>,
    pub living_rooms: Option<f64>,
    pub tenure: Option<String>,
    pub property_type: Option<String>,
    pub current_energy_rating: Option<String>,
    pub rent_estimate_current_price: Option<f64>,
    pub sale_estimate_lower_price: Option<f64>,
    pub sale_estimate_current_price: Option<f64>,
    pub sale_estimate_upper_price: Option<f64>,
    pub sale_estimate_confidence_level: Option<String>,
    pub sale_estimate_ingested_at: Option<DateTime<Utc>>,
    pub value_change_numeric: Option<f64>,
    pub value_change_percentage: Option<f64>,
    pub value_change_sale_date: Option<NaiveDate>,
    pub history_date: Option<NaiveDate>,
    pub history_price: Option<f64>,
    pub history_percentage_change: Option<f64>,
    pub history_numeric_change: Option<f64>,
    /// Borough containing the property, assigned from its coordinates
    pub borough: Option<String>,
}

impl Property {
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        Location::from_parts(self.latitude, self.longitude)
    }

    /// Estimated price divided by floor area
    #[must_use]
    pub fn price_per_sqm(&self) -> Option<f64> {
        match (self.sale_estimate_current_price, self.floor_area_sqm) {
            (Some(price), Some(area)) if area > 0.0 => Some(price / area),
            _ => None,
        }
    }

    #[must_use]
    pub fn in_borough(&self, name: &str) -> bool {
        self.borough.as_deref() == Some(name)
    }
}
