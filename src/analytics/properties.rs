//! Most expensive properties and the property details view

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use super::kpi::format_money;
use crate::data::Dataset;
use crate::models::{Location, Property, StreetViewSize};
use crate::Result;

pub const TOP_PROPERTY_COUNT: usize = 5;
/// Zoom level of the single-pin map in the details view
pub const DETAIL_MAP_ZOOM: u8 = 12;

/// One tile of the "most expensive properties" row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProperty {
    pub id: usize,
    pub full_address: String,
    pub price: f64,
    pub price_label: String,
    pub borough: Option<String>,
    pub location: Location,
    /// Present only when a Google Maps key is configured
    pub street_view_url: Option<String>,
}

/// The `n` most expensive distinct addresses that have a price and
/// coordinates
#[must_use]
pub fn top_properties(rows: &[&Property], n: usize, google_key: Option<&str>) -> Vec<TopProperty> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<(&Property, f64, Location)> = rows
        .iter()
        .filter_map(|p| Some((*p, p.sale_estimate_current_price?, p.location()?)))
        .filter(|(p, _, _)| seen.insert(p.full_address.as_str()))
        .collect();

    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    candidates
        .into_iter()
        .take(n)
        .map(|(p, price, location)| TopProperty {
            id: p.id,
            full_address: p.full_address.clone(),
            price,
            price_label: format_money(Some(price)),
            borough: p.borough.clone(),
            location,
            street_view_url: google_key
                .map(|key| location.street_view_url(StreetViewSize::Thumbnail, key)),
        })
        .collect()
}

/// Everything shown in the property details dialog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDetails {
    pub id: usize,
    pub full_address: String,
    pub estimated_price: Option<f64>,
    pub estimated_price_label: String,
    pub floor_area_sqm: Option<f64>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub living_rooms: Option<i64>,
    pub borough: Option<String>,
    pub property_type: Option<String>,
    pub tenure: Option<String>,
    pub current_energy_rating: Option<String>,
    pub location: Option<Location>,
    pub street_view_url: Option<String>,
    pub map_zoom: u8,
}

/// Room counts are shown as whole numbers
fn whole(value: Option<f64>) -> Option<i64> {
    value.map(|v| v.trunc() as i64)
}

/// Details for the row with the given id
pub fn property_details(dataset: &Dataset, id: usize, google_key: Option<&str>) -> Result<PropertyDetails> {
    let p = dataset.get(id)?;
    let location = p.location();

    Ok(PropertyDetails {
        id: p.id,
        full_address: p.full_address.clone(),
        estimated_price: p.sale_estimate_current_price,
        estimated_price_label: format_money(p.sale_estimate_current_price),
        floor_area_sqm: p.floor_area_sqm,
        bedrooms: whole(p.bedrooms),
        bathrooms: whole(p.bathrooms),
        living_rooms: whole(p.living_rooms),
        borough: p.borough.clone(),
        property_type: p.property_type.clone(),
        tenure: p.tenure.clone(),
        current_energy_rating: p.current_energy_rating.clone(),
        location,
        street_view_url: location
            .zip(google_key)
            .map(|(loc, key)| loc.street_view_url(StreetViewSize::Detail, key)),
        map_zoom: DETAIL_MAP_ZOOM,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HousingError;

    fn row(address: &str, price: Option<f64>, lat: Option<f64>) -> Property {
        Property {
            full_address: address.to_string(),
            sale_estimate_current_price: price,
            latitude: lat,
            longitude: lat.map(|_| -0.1),
            bedrooms: Some(3.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_top_properties() {
        let dataset = Dataset::from_properties(vec![
            row("a", Some(1_000_000.0), Some(51.5)),
            row("a", Some(5_000_000.0), Some(51.5)),
            row("b", Some(2_000_000.0), Some(51.6)),
            row("c", Some(9_000_000.0), None),
            row("d", None, Some(51.4)),
            row("e", Some(3_000_000.0), Some(51.3)),
        ]);
        let refs: Vec<&Property> = dataset.properties().iter().collect();

        let top = top_properties(&refs, 2, Some("key"));
        let addresses: Vec<&str> = top.iter().map(|t| t.full_address.as_str()).collect();
        assert_eq!(addresses, vec!["e", "b"]);
        assert_eq!(top[0].price_label, "£3,000,000");
        assert!(top[0]
            .street_view_url
            .as_deref()
            .is_some_and(|url| url.contains("size=200x150&location=51.3,-0.1&key=key")));

        // first row per address is kept, before sorting
        let all = top_properties(&refs, 5, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].full_address, "a");
        assert_eq!(all[2].price, 1_000_000.0);
        assert!(all.iter().all(|t| t.street_view_url.is_none()));
    }

    #[test]
    fn test_property_details() {
        let dataset = Dataset::from_properties(vec![row("a", Some(1_000_000.0), Some(51.5))]);
        let details = property_details(&dataset, 0, Some("key")).unwrap();
        assert_eq!(details.bedrooms, Some(3));
        assert_eq!(details.map_zoom, 12);
        assert!(details.street_view_url.unwrap().contains("size=400x300"));

        assert!(matches!(
            property_details(&dataset, 7, None),
            Err(HousingError::NotFound { .. })
        ));
    }
}
