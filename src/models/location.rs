//! Location model for property coordinates

use serde::{Deserialize, Serialize};

/// WGS84 coordinates of a property
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

/// Image sizes requested from the Street View static API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreetViewSize {
    /// 200x150, used on the top-property tiles
    Thumbnail,
    /// 400x300, used in the property details view
    Detail,
}

impl StreetViewSize {
    fn as_param(self) -> &'static str {
        match self {
            StreetViewSize::Thumbnail => "200x150",
            StreetViewSize::Detail => "400x300",
        }
    }
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates present and finite
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }

    /// Format location as the `lat,lon` pair Google expects
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// Street View static image URL for this location
    #[must_use]
    pub fn street_view_url(&self, size: StreetViewSize, api_key: &str) -> String {
        format!(
            "https://maps.googleapis.com/maps/api/streetview?size={}&location={}&key={}",
            size.as_param(),
            self.format_coordinates(),
            urlencoding::encode(api_key)
        )
    }
}
