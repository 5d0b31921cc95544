//! Offline training: data preparation, randomized hyperparameter search
//! with K-fold cross-validation, final fit and evaluation

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{info, instrument};

use super::encoding::{FeatureEncoder, PropertyFeatures};
use super::gbm::{BoosterParams, GradientBoostedTrees, RegressionMetrics};
use super::model_store::{ModelArtifact, ModelMetadata};
use crate::analytics::format_money_pence;
use crate::cache::PersistentCache;
use crate::config::{HousingConfig, TrainingConfig};
use crate::data::{Dataset, load_dataset};
use crate::models::Property;
use crate::spatial::BoroughAtlas;
use crate::{HousingError, Result};

const N_ESTIMATORS: [usize; 3] = [100, 300, 500];
const MAX_DEPTH: [usize; 4] = [3, 5, 7, 10];
const LEARNING_RATE: [f64; 4] = [0.01, 0.05, 0.1, 0.2];
const SUBSAMPLE: [f64; 3] = [0.6, 0.8, 1.0];
const COLSAMPLE_BYTREE: [f64; 3] = [0.6, 0.8, 1.0];
const GAMMA: [f64; 3] = [0.0, 1.0, 5.0];

/// Encoded model inputs and sale-price targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rows at `indices`, in that order
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

/// Rows with every model input and a price, plus the encoder fitted on them
#[must_use]
pub fn prepare_training_data(rows: &[Property]) -> (FeatureEncoder, TrainingSet) {
    let samples: Vec<(PropertyFeatures, f64)> = rows
        .iter()
        .filter_map(|p| Some((PropertyFeatures::from_property(p)?, p.sale_estimate_current_price?)))
        .collect();

    let encoder = FeatureEncoder::fit(samples.iter().map(|(f, _)| f));
    let set = TrainingSet {
        features: samples.iter().map(|(f, _)| encoder.encode(f)).collect(),
        targets: samples.iter().map(|(_, y)| *y).collect(),
    };
    (encoder, set)
}

/// Shuffled split of `0..n`: `(rest, held_out)` with `ceil(n * fraction)`
/// rows held out
#[must_use]
pub fn shuffle_split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let held_out = ((n as f64 * fraction).ceil() as usize).min(n);
    let rest = indices.split_off(held_out);
    (rest, indices)
}

/// Contiguous, unshuffled folds; the first `n % k` folds get one extra row
#[must_use]
pub fn kfold_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Every combination of the search space
#[must_use]
pub fn parameter_grid() -> Vec<BoosterParams> {
    let mut grid = Vec::new();
    for &n_estimators in &N_ESTIMATORS {
        for &max_depth in &MAX_DEPTH {
            for &learning_rate in &LEARNING_RATE {
                for &subsample in &SUBSAMPLE {
                    for &colsample_bytree in &COLSAMPLE_BYTREE {
                        for &gamma in &GAMMA {
                            grid.push(BoosterParams {
                                n_estimators,
                                max_depth,
                                learning_rate,
                                subsample,
                                colsample_bytree,
                                gamma,
                                ..BoosterParams::default()
                            });
                        }
                    }
                }
            }
        }
    }
    grid
}

/// `n` distinct grid points drawn with `seed`
#[must_use]
pub fn sample_candidates(n: usize, seed: u64) -> Vec<BoosterParams> {
    let mut grid = parameter_grid();
    grid.shuffle(&mut StdRng::seed_from_u64(seed));
    grid.truncate(n);
    for params in &mut grid {
        params.seed = seed;
    }
    grid
}

/// Mean RMSE over unshuffled K-fold cross-validation
pub fn cross_validate(data: &TrainingSet, params: BoosterParams, folds: usize) -> Result<f64> {
    if folds < 2 || data.len() < folds {
        return Err(HousingError::model(format!(
            "cannot run {folds}-fold cross-validation on {} rows",
            data.len()
        )));
    }

    let mut total = 0.0;
    for fold in kfold_ranges(data.len(), folds) {
        let train: Vec<usize> = (0..data.len()).filter(|i| !fold.contains(i)).collect();
        let held_out: Vec<usize> = fold.collect();
        let train = data.select(&train);
        let held_out = data.select(&held_out);

        let model = GradientBoostedTrees::fit(&train.features, &train.targets, params)?;
        let predictions = model.predict_many(&held_out.features);
        let metrics = RegressionMetrics::compute(&held_out.targets, &predictions)
            .ok_or_else(|| HousingError::model("empty validation fold"))?;
        total += metrics.rmse;
    }
    Ok(total / folds as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateScore {
    pub params: BoosterParams,
    pub cv_rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub best: CandidateScore,
    /// Every candidate in sampling order
    pub scores: Vec<CandidateScore>,
}

/// Cross-validate every candidate on blocking worker threads, at most one
/// per available core at a time, and keep the lowest mean RMSE
#[instrument(skip_all, fields(candidates = candidates.len(), rows = data.len()))]
pub async fn randomized_search(
    data: Arc<TrainingSet>,
    candidates: Vec<BoosterParams>,
    folds: usize,
) -> Result<SearchOutcome> {
    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);

    let scores: Vec<CandidateScore> = stream::iter(candidates.into_iter().enumerate())
        .map(|(i, params)| {
            let data = Arc::clone(&data);
            async move {
                let cv_rmse = tokio::task::spawn_blocking(move || cross_validate(&data, params, folds))
                    .await
                    .map_err(|e| HousingError::model(format!("search worker failed: {e}")))??;
                info!(candidate = i, cv_rmse, "candidate evaluated");
                Ok::<_, HousingError>(CandidateScore { params, cv_rmse })
            }
        })
        .buffered(workers)
        .try_collect()
        .await?;

    let best = scores
        .iter()
        .copied()
        .reduce(|best, s| if s.cv_rmse < best.cv_rmse { s } else { best })
        .ok_or_else(|| HousingError::model("no candidates to evaluate"))?;

    Ok(SearchOutcome { best, scores })
}

/// Result of a full training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub best_params: BoosterParams,
    pub cv_rmse: f64,
    pub test_metrics: Option<RegressionMetrics>,
    pub training_rows: usize,
    pub test_rows: usize,
    pub feature_columns: Vec<String>,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.best_params;
        writeln!(f, "Best Parameters Found:")?;
        writeln!(f, "  n_estimators: {}", p.n_estimators)?;
        writeln!(f, "  max_depth: {}", p.max_depth)?;
        writeln!(f, "  learning_rate: {}", p.learning_rate)?;
        writeln!(f, "  subsample: {}", p.subsample)?;
        writeln!(f, "  colsample_bytree: {}", p.colsample_bytree)?;
        writeln!(f, "  gamma: {}", p.gamma)?;
        writeln!(f, "Cross-validated RMSE: {}", format_money_pence(self.cv_rmse))?;
        writeln!(f, "Training rows: {}, test rows: {}", self.training_rows, self.test_rows)?;
        match &self.test_metrics {
            Some(m) => {
                writeln!(f, "RMSE: {}", format_money_pence(m.rmse))?;
                write!(f, "R² Score: {:.4}", m.r2)
            }
            None => write!(f, "No test rows to evaluate"),
        }
    }
}

/// Search, refit and evaluate on an already loaded dataset
#[instrument(skip_all, fields(rows = dataset.len()))]
pub async fn train_model(dataset: &Dataset, config: &TrainingConfig) -> Result<(ModelArtifact, TrainingReport)> {
    let (encoder, data) = prepare_training_data(dataset.properties());
    info!("{} usable rows, {} features", data.len(), encoder.width());
    if data.len() < config.cv_folds * 2 {
        return Err(HousingError::model(format!(
            "only {} complete rows, not enough to train",
            data.len()
        )));
    }

    // hold out the test rows, then reorder the remainder as train followed
    // by validation before tuning on it
    let (rest, test_idx) = shuffle_split(data.len(), config.test_fraction, config.seed);
    let (train_pos, val_pos) = shuffle_split(rest.len(), config.validation_fraction, config.seed);
    let tuning_idx: Vec<usize> = train_pos.iter().chain(&val_pos).map(|&p| rest[p]).collect();
    let tuning = Arc::new(data.select(&tuning_idx));
    let test = data.select(&test_idx);

    let candidates = sample_candidates(config.n_iter, config.seed);
    let outcome = randomized_search(Arc::clone(&tuning), candidates, config.cv_folds).await?;
    info!(
        cv_rmse = outcome.best.cv_rmse,
        "Best parameters found: {:?}",
        outcome.best.params
    );

    let best = outcome.best.params;
    let fit_data = Arc::clone(&tuning);
    let model = tokio::task::spawn_blocking(move || {
        GradientBoostedTrees::fit(&fit_data.features, &fit_data.targets, best)
    })
    .await
    .map_err(|e| HousingError::model(format!("final fit failed: {e}")))??;

    let test_metrics = RegressionMetrics::compute(&test.targets, &model.predict_many(&test.features));

    let report = TrainingReport {
        best_params: best,
        cv_rmse: outcome.best.cv_rmse,
        test_metrics,
        training_rows: tuning.len(),
        test_rows: test.len(),
        feature_columns: encoder.feature_columns(),
    };
    let artifact = ModelArtifact {
        model,
        feature_columns: encoder.feature_columns(),
        metadata: ModelMetadata {
            trained_at: Utc::now(),
            crate_version: crate::VERSION.to_string(),
            params: best,
            cv_rmse: outcome.best.cv_rmse,
            test_metrics,
            training_rows: tuning.len(),
            test_rows: test.len(),
        },
    };
    Ok((artifact, report))
}

/// The `train` command: load the data, train, and write the model file
pub async fn run_training(config: &HousingConfig) -> anyhow::Result<TrainingReport> {
    let boroughs_dir = config.data.boroughs_dir.clone();
    let atlas = tokio::task::spawn_blocking(move || BoroughAtlas::load(boroughs_dir))
        .await?
        .context("failed to load borough boundaries")?;

    let cache = if config.cache.enabled {
        PersistentCache::open(&config.cache.location)
            .inspect_err(|e| tracing::warn!("Cache unavailable: {e}"))
            .ok()
    } else {
        None
    };
    let dataset = load_dataset(&config.data, Arc::new(atlas), cache.as_ref(), config.cache.ttl()).await?;

    let (artifact, report) = train_model(&dataset, &config.training).await?;
    artifact
        .save(&config.data.model_path)
        .with_context(|| format!("failed to write {}", config.data.model_path.display()))?;
    Ok(report)
}
