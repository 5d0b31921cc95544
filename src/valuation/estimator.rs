//! Price prediction for a described property and its closest matches in the
//! dataset

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::encoding::{FeatureEncoder, PropertyFeatures};
use super::gbm::GradientBoostedTrees;
use super::model_store::{ModelArtifact, ModelMetadata};
use crate::analytics::format_money;
use crate::models::Property;
use crate::{HousingError, Result};

pub const SIMILAR_PROPERTY_COUNT: usize = 5;

/// The estimator form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub borough: String,
    pub property_type: String,
    #[serde(default = "default_floor_area")]
    pub floor_area_sqm: f64,
    #[serde(default = "default_bedrooms")]
    pub bedrooms: u32,
    #[serde(default = "default_bathrooms")]
    pub bathrooms: u32,
    #[serde(default = "default_living_rooms")]
    pub living_rooms: u32,
}

fn default_floor_area() -> f64 {
    80.0
}

fn default_bedrooms() -> u32 {
    2
}

fn default_bathrooms() -> u32 {
    1
}

fn default_living_rooms() -> u32 {
    1
}

impl PredictionInput {
    pub fn validate(&self) -> Result<()> {
        if self.borough.trim().is_empty() {
            return Err(HousingError::validation("Borough is required"));
        }
        if self.property_type.trim().is_empty() {
            return Err(HousingError::validation("Property type is required"));
        }
        if !(10.0..=500.0).contains(&self.floor_area_sqm) {
            return Err(HousingError::validation("Floor area must be between 10 and 500 m²"));
        }
        for (name, value, max) in [
            ("Bedrooms", self.bedrooms, 10),
            ("Bathrooms", self.bathrooms, 10),
            ("Living rooms", self.living_rooms, 8),
        ] {
            if value > max {
                return Err(HousingError::validation(format!("{name} must be between 0 and {max}")));
            }
        }
        Ok(())
    }

    fn features(&self) -> PropertyFeatures {
        PropertyFeatures {
            borough: self.borough.clone(),
            property_type: self.property_type.clone(),
            floor_area_sqm: self.floor_area_sqm,
            bedrooms: f64::from(self.bedrooms),
            bathrooms: f64::from(self.bathrooms),
            living_rooms: f64::from(self.living_rooms),
        }
    }

    /// Weighted distance to a dataset row; `None` when any term is missing
    fn distance(&self, p: &Property) -> Option<f64> {
        Some(
            (p.floor_area_sqm? - self.floor_area_sqm).abs()
                + 10.0 * (p.bedrooms? - f64::from(self.bedrooms)).abs()
                + 10.0 * (p.bathrooms? - f64::from(self.bathrooms)).abs()
                + 5.0 * (p.living_rooms? - f64::from(self.living_rooms)).abs(),
        )
    }
}

/// A dataset row shown under the estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarProperty {
    pub id: usize,
    pub full_address: String,
    pub borough: Option<String>,
    pub floor_area_sqm: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub living_rooms: Option<f64>,
    pub property_type: Option<String>,
    pub estimated_price: Option<f64>,
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub predicted_price: f64,
    /// `Estimated Sale Price: £1,234,567`
    pub predicted_label: String,
    pub similar: Vec<SimilarProperty>,
}

/// Loaded price model ready to serve predictions
#[derive(Debug, Clone)]
pub struct PriceEstimator {
    model: GradientBoostedTrees,
    encoder: FeatureEncoder,
    metadata: ModelMetadata,
}

impl PriceEstimator {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let encoder = FeatureEncoder::from_feature_columns(&artifact.feature_columns)?;
        Ok(Self {
            model: artifact.model,
            encoder,
            metadata: artifact.metadata,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let estimator = Self::from_artifact(ModelArtifact::load(path)?)?;
        info!(
            "Loaded price model trained at {} ({} trees)",
            estimator.metadata.trained_at,
            estimator.model.trees().len()
        );
        Ok(estimator)
    }

    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn predict(&self, input: &PredictionInput) -> Result<f64> {
        input.validate()?;
        Ok(self.model.predict(&self.encoder.encode(&input.features())))
    }

    /// Predict the price and list the closest rows of `rows` in the same
    /// borough, preferring the same property type when there are any
    pub fn estimate(&self, rows: &[&Property], input: &PredictionInput) -> Result<Estimate> {
        let predicted_price = self.predict(input)?;
        Ok(Estimate {
            predicted_price,
            predicted_label: format!("Estimated Sale Price: {}", format_money(Some(predicted_price))),
            similar: similar_properties(rows, input, SIMILAR_PROPERTY_COUNT),
        })
    }
}

/// Rows in the input's borough ranked by distance, missing distances last
#[must_use]
pub fn similar_properties(rows: &[&Property], input: &PredictionInput, n: usize) -> Vec<SimilarProperty> {
    let in_borough: Vec<&Property> = rows.iter().copied().filter(|p| p.in_borough(&input.borough)).collect();
    let same_type: Vec<&Property> = in_borough
        .iter()
        .copied()
        .filter(|p| p.property_type.as_deref() == Some(input.property_type.as_str()))
        .collect();
    let pool = if same_type.is_empty() { in_borough } else { same_type };

    let mut ranked: Vec<(&Property, Option<f64>)> = pool.into_iter().map(|p| (p, input.distance(p))).collect();
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ranked
        .into_iter()
        .take(n)
        .map(|(p, similarity)| SimilarProperty {
            id: p.id,
            full_address: p.full_address.clone(),
            borough: p.borough.clone(),
            floor_area_sqm: p.floor_area_sqm,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            living_rooms: p.living_rooms,
            property_type: p.property_type.clone(),
            estimated_price: p.sale_estimate_current_price,
            similarity,
        })
        .collect()
}
