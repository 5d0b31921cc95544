//! Borough choropleth: per-borough metrics rendered as shaded GeoJSON

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use geo::{LineString, MultiPolygon};
use serde::Serialize;
use serde_json::{Value, json};

use super::boroughs::BoroughAtlas;
use crate::models::Property;
use crate::{HousingError, Result};

const START_COLOR: [f64; 3] = [240.0, 224.0, 200.0];
const END_COLOR: [f64; 3] = [150.0, 90.0, 60.0];
const FILL_ALPHA: u8 = 180;

pub const LINE_COLOR: [u8; 3] = [80, 80, 80];
pub const MAP_STYLE: &str = "mapbox://styles/mapbox/light-v10";
pub const TOOLTIP: &str = "{borough}: {value}";

/// Value used to shade the boroughs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMetric {
    #[default]
    Count,
    AvgEstimatedPrice,
    AvgHistoryPrice,
    AvgSize,
    AvgPricePerSqm,
}

impl MapMetric {
    pub const ALL: [MapMetric; 5] = [
        MapMetric::Count,
        MapMetric::AvgEstimatedPrice,
        MapMetric::AvgHistoryPrice,
        MapMetric::AvgSize,
        MapMetric::AvgPricePerSqm,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MapMetric::Count => "Count",
            MapMetric::AvgEstimatedPrice => "Avg. Estimated Price",
            MapMetric::AvgHistoryPrice => "Avg. History Price",
            MapMetric::AvgSize => "Avg. Size",
            MapMetric::AvgPricePerSqm => "Avg. Price per m²",
        }
    }

    fn id(self) -> &'static str {
        match self {
            MapMetric::Count => "count",
            MapMetric::AvgEstimatedPrice => "avg_estimated_price",
            MapMetric::AvgHistoryPrice => "avg_history_price",
            MapMetric::AvgSize => "avg_size",
            MapMetric::AvgPricePerSqm => "avg_price_per_sqm",
        }
    }

    /// Per-row value averaged by the mean metrics
    fn sample(self, property: &Property) -> Option<f64> {
        match self {
            MapMetric::Count => None,
            MapMetric::AvgEstimatedPrice => property.sale_estimate_current_price,
            MapMetric::AvgHistoryPrice => property.history_price,
            MapMetric::AvgSize => property.floor_area_sqm,
            MapMetric::AvgPricePerSqm => property.price_per_sqm(),
        }
    }
}

impl fmt::Display for MapMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MapMetric {
    type Err = HousingError;

    /// Accepts either the display label or the snake_case id
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        MapMetric::ALL
            .into_iter()
            .find(|m| m.label() == wanted || m.id() == wanted)
            .ok_or_else(|| HousingError::validation(format!("Unsupported metric: {s}")))
    }
}

/// Metric value per borough, boroughs with no usable rows omitted
#[must_use]
pub fn borough_values(rows: &[&Property], metric: MapMetric) -> BTreeMap<String, f64> {
    match metric {
        MapMetric::Count => {
            let mut addresses: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
            for property in rows {
                if let Some(borough) = property.borough.as_deref() {
                    addresses
                        .entry(borough)
                        .or_default()
                        .insert(property.full_address.as_str());
                }
            }
            addresses
                .into_iter()
                .map(|(borough, set)| (borough.to_string(), set.len() as f64))
                .collect()
        }
        _ => {
            let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
            for property in rows {
                let (Some(borough), Some(value)) = (property.borough.as_deref(), metric.sample(property))
                else {
                    continue;
                };
                let entry = sums.entry(borough).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
            sums.into_iter()
                .map(|(borough, (sum, n))| (borough.to_string(), sum / n as f64))
                .collect()
        }
    }
}

/// Beige-to-rust RGBA shade for `value` relative to `max_value`
#[must_use]
pub fn interpolate_color(value: f64, max_value: f64) -> [u8; 4] {
    let ratio = if max_value != 0.0 {
        (value / max_value).min(1.0)
    } else {
        0.0
    };
    let channel = |i: usize| (START_COLOR[i] + ratio * (END_COLOR[i] - START_COLOR[i])).trunc() as u8;
    [channel(0), channel(1), channel(2), FILL_ALPHA]
}

/// Initial camera over central London
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub pitch: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            latitude: 51.5074,
            longitude: -0.1278,
            zoom: 9.0,
            pitch: 0.0,
        }
    }
}

/// Everything the front end needs to draw the borough map
#[derive(Debug, Clone, Serialize)]
pub struct ChoroplethMap {
    pub metric: MapMetric,
    pub metric_label: &'static str,
    pub max_value: f64,
    /// GeoJSON FeatureCollection with `borough`, `value` and `fill_color` properties
    pub features: Value,
    pub line_color: [u8; 3],
    pub view_state: ViewState,
    pub map_style: &'static str,
    pub tooltip: &'static str,
}

/// Shade every borough shape by the chosen metric
#[must_use]
pub fn build_choropleth(atlas: &BoroughAtlas, rows: &[&Property], metric: MapMetric) -> ChoroplethMap {
    let values = borough_values(rows, metric);

    let shaded: Vec<(&str, &MultiPolygon<f64>, f64)> = atlas
        .shapes()
        .iter()
        .map(|shape| {
            let value = values
                .get(&shape.borough)
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
                .round_ties_even();
            (shape.borough.as_str(), &shape.geometry, value)
        })
        .collect();

    let max_value = shaded
        .iter()
        .map(|(_, _, value)| *value)
        .fold(0.0_f64, f64::max);
    let max_value = if max_value == 0.0 { 1.0 } else { max_value };

    let features: Vec<Value> = shaded
        .into_iter()
        .map(|(borough, geometry, value)| {
            json!({
                "type": "Feature",
                "geometry": multipolygon_geojson(geometry),
                "properties": {
                    "borough": borough,
                    "value": value,
                    "fill_color": interpolate_color(value, max_value),
                }
            })
        })
        .collect();

    ChoroplethMap {
        metric,
        metric_label: metric.label(),
        max_value,
        features: json!({ "type": "FeatureCollection", "features": features }),
        line_color: LINE_COLOR,
        view_state: ViewState::default(),
        map_style: MAP_STYLE,
        tooltip: TOOLTIP,
    }
}

fn ring_coordinates(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn multipolygon_geojson(geometry: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring_coordinates)
                .collect()
        })
        .collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::boroughs::BoroughShape;
    use geo::Polygon;
    use rstest::rstest;

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        )])
    }

    fn property(address: &str, borough: Option<&str>, price: Option<f64>, area: Option<f64>) -> Property {
        Property {
            full_address: address.to_string(),
            borough: borough.map(str::to_string),
            sale_estimate_current_price: price,
            floor_area_sqm: area,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(0.0, 100.0, [240, 224, 200, 180])]
    #[case(100.0, 100.0, [150, 90, 60, 180])]
    #[case(50.0, 100.0, [195, 157, 130, 180])]
    #[case(500.0, 100.0, [150, 90, 60, 180])]
    #[case(5.0, 0.0, [240, 224, 200, 180])]
    fn test_interpolate_color(#[case] value: f64, #[case] max: f64, #[case] expected: [u8; 4]) {
        assert_eq!(interpolate_color(value, max), expected);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("Avg. Price per m²".parse::<MapMetric>().unwrap(), MapMetric::AvgPricePerSqm);
        assert_eq!("avg_size".parse::<MapMetric>().unwrap(), MapMetric::AvgSize);
        assert!("Median".parse::<MapMetric>().is_err());
    }

    #[test]
    fn test_count_uses_distinct_addresses() {
        let rows = [
            property("1 A St", Some("Camden"), None, None),
            property("1 A St", Some("Camden"), None, None),
            property("2 B St", Some("Camden"), None, None),
            property("3 C St", None, None, None),
        ];
        let refs: Vec<&Property> = rows.iter().collect();
        let values = borough_values(&refs, MapMetric::Count);
        assert_eq!(values.len(), 1);
        assert_eq!(values["Camden"], 2.0);
    }

    #[test]
    fn test_price_per_sqm_skips_incomplete_rows() {
        let rows = [
            property("1", Some("Hackney"), Some(400_000.0), Some(40.0)),
            property("2", Some("Hackney"), Some(900_000.0), None),
            property("3", Some("Hackney"), Some(600_000.0), Some(30.0)),
        ];
        let refs: Vec<&Property> = rows.iter().collect();
        let values = borough_values(&refs, MapMetric::AvgPricePerSqm);
        assert_eq!(values["Hackney"], 15_000.0);
    }

    #[test]
    fn test_build_fills_missing_boroughs_with_zero() {
        let atlas = BoroughAtlas::from_shapes(vec![
            BoroughShape::new("Camden", unit_square()),
            BoroughShape::new("Hackney", unit_square()),
        ]);
        let rows = [property("1", Some("Camden"), Some(1_000_000.4), None)];
        let refs: Vec<&Property> = rows.iter().collect();

        let map = build_choropleth(&atlas, &refs, MapMetric::AvgEstimatedPrice);
        assert_eq!(map.max_value, 1_000_000.0);

        let features = map.features["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["value"], json!(1_000_000.0));
        assert_eq!(features[0]["properties"]["fill_color"], json!([150, 90, 60, 180]));
        assert_eq!(features[1]["properties"]["value"], json!(0.0));
        assert_eq!(features[1]["geometry"]["type"], json!("MultiPolygon"));
        assert_eq!(map.map_style, MAP_STYLE);
    }

    #[test]
    fn test_empty_data_uses_unit_max() {
        let atlas = BoroughAtlas::from_shapes(vec![BoroughShape::new("Camden", unit_square())]);
        let map = build_choropleth(&atlas, &[], MapMetric::Count);
        assert_eq!(map.max_value, 1.0);
    }
}
