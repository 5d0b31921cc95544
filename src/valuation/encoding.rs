//! One-hot feature encoding for the price model

use serde::{Deserialize, Serialize};

use crate::models::Property;
use crate::{HousingError, Result};

const NUMERIC_COLUMNS: [&str; 4] = ["floorAreaSqM", "bedrooms", "bathrooms", "livingRooms"];
const BOROUGH_PREFIX: &str = "borough_";
const TYPE_PREFIX: &str = "propertyType_";

/// The model inputs describing one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFeatures {
    pub borough: String,
    pub property_type: String,
    pub floor_area_sqm: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub living_rooms: f64,
}

impl PropertyFeatures {
    /// `None` unless every model input is present
    #[must_use]
    pub fn from_property(p: &Property) -> Option<Self> {
        Some(Self {
            borough: p.borough.clone()?,
            property_type: p.property_type.clone()?,
            floor_area_sqm: p.floor_area_sqm?,
            bedrooms: p.bedrooms?,
            bathrooms: p.bathrooms?,
            living_rooms: p.living_rooms?,
        })
    }
}

/// Maps [`PropertyFeatures`] to the numeric vector the model was trained on:
/// the four numeric columns, then one indicator per borough, then one per
/// property type, categories in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEncoder {
    boroughs: Vec<String>,
    property_types: Vec<String>,
}

impl FeatureEncoder {
    /// Learn the categories present in `samples`
    pub fn fit<'a>(samples: impl IntoIterator<Item = &'a PropertyFeatures>) -> Self {
        let mut boroughs = Vec::new();
        let mut property_types = Vec::new();
        for s in samples {
            boroughs.push(s.borough.clone());
            property_types.push(s.property_type.clone());
        }
        boroughs.sort();
        boroughs.dedup();
        property_types.sort();
        property_types.dedup();
        Self {
            boroughs,
            property_types,
        }
    }

    /// Rebuild the encoder from saved column names
    pub fn from_feature_columns(columns: &[String]) -> Result<Self> {
        if columns.len() < NUMERIC_COLUMNS.len()
            || columns.iter().zip(NUMERIC_COLUMNS).any(|(c, expected)| c != expected)
        {
            return Err(HousingError::model(format!(
                "feature columns must start with {}",
                NUMERIC_COLUMNS.join(", ")
            )));
        }

        let mut boroughs = Vec::new();
        let mut property_types = Vec::new();
        for column in &columns[NUMERIC_COLUMNS.len()..] {
            if let Some(name) = column.strip_prefix(BOROUGH_PREFIX) {
                boroughs.push(name.to_string());
            } else if let Some(name) = column.strip_prefix(TYPE_PREFIX) {
                property_types.push(name.to_string());
            } else {
                return Err(HousingError::model(format!("unknown feature column '{column}'")));
            }
        }
        Ok(Self {
            boroughs,
            property_types,
        })
    }

    #[must_use]
    pub fn feature_columns(&self) -> Vec<String> {
        NUMERIC_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(self.boroughs.iter().map(|b| format!("{BOROUGH_PREFIX}{b}")))
            .chain(self.property_types.iter().map(|t| format!("{TYPE_PREFIX}{t}")))
            .collect()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        NUMERIC_COLUMNS.len() + self.boroughs.len() + self.property_types.len()
    }

    #[must_use]
    pub fn boroughs(&self) -> &[String] {
        &self.boroughs
    }

    #[must_use]
    pub fn property_types(&self) -> &[String] {
        &self.property_types
    }

    /// Unseen categories encode as all zeros
    #[must_use]
    pub fn encode(&self, features: &PropertyFeatures) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.extend([
            features.floor_area_sqm,
            features.bedrooms,
            features.bathrooms,
            features.living_rooms,
        ]);
        row.extend(self.boroughs.iter().map(|b| f64::from(u8::from(*b == features.borough))));
        row.extend(
            self.property_types
                .iter()
                .map(|t| f64::from(u8::from(*t == features.property_type))),
        );
        row
    }
}
