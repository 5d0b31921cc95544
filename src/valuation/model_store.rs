//! Persistence of the trained price model

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::gbm::{BoosterParams, GradientBoostedTrees, RegressionMetrics};
use crate::{HousingError, Result};

/// How and when a model was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub crate_version: String,
    pub params: BoosterParams,
    pub cv_rmse: f64,
    pub test_metrics: Option<RegressionMetrics>,
    pub training_rows: usize,
    pub test_rows: usize,
}

/// The trained model together with the feature columns it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: GradientBoostedTrees,
    pub feature_columns: Vec<String>,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Write the artifact, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = postcard::to_stdvec(self)?;
        fs::write(path, &bytes)?;
        info!("Saved model to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            HousingError::model(format!("cannot read model {}: {e}", path.display()))
        })?;
        let artifact: Self = postcard::from_bytes(&bytes)?;
        if artifact.model.n_features() != artifact.feature_columns.len() {
            return Err(HousingError::model(format!(
                "model expects {} features but lists {} columns",
                artifact.model.n_features(),
                artifact.feature_columns.len()
            )));
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ModelArtifact {
        let features = vec![vec![1.0, 0.0], vec![2.0, 1.0], vec![3.0, 0.0], vec![4.0, 1.0]];
        let targets = vec![10.0, 20.0, 30.0, 40.0];
        let params = BoosterParams {
            n_estimators: 5,
            ..BoosterParams::default()
        };
        ModelArtifact {
            model: GradientBoostedTrees::fit(&features, &targets, params).unwrap(),
            feature_columns: vec!["floorAreaSqM".into(), "borough_Camden".into()],
            metadata: ModelMetadata {
                trained_at: Utc::now(),
                crate_version: crate::VERSION.to_string(),
                params,
                cv_rmse: 1.5,
                test_metrics: None,
                training_rows: 4,
                test_rows: 0,
            },
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let original = artifact();
        original.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.model.predict(&[2.0, 1.0]), original.model.predict(&[2.0, 1.0]));
    }

    #[test]
    fn test_missing_or_corrupt_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        assert!(matches!(ModelArtifact::load(&path), Err(HousingError::Model { .. })));

        fs::write(&path, b"not a model").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }
}
