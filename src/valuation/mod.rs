//! Price model and investment tools
//!
//! - `encoding`: one-hot feature columns
//! - `gbm`: gradient-boosted regression trees
//! - `tuning`: offline randomized search and training
//! - `model_store`: model persistence
//! - `estimator`: price predictions and similar properties
//! - `roi`: growth suggestion and ROI projection

pub mod encoding;
pub mod estimator;
pub mod gbm;
pub mod model_store;
pub mod roi;
pub mod tuning;

pub use encoding::{FeatureEncoder, PropertyFeatures};
pub use estimator::{Estimate, PredictionInput, PriceEstimator, SimilarProperty};
pub use gbm::{BoosterParams, GradientBoostedTrees, RegressionMetrics};
pub use model_store::{ModelArtifact, ModelMetadata};
pub use roi::{GrowthSuggestion, RoiInput, RoiResult, historical_growth};
pub use tuning::{TrainingReport, run_training, train_model};
