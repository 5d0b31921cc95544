//! Gradient-boosted regression trees
//!
//! Squared-error boosting with second-order split gain, L2-regularised leaf
//! weights, per-tree row and column sampling and histogram split finding
//! over quantile bins. Training is deterministic for a given seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{HousingError, Result};

/// Booster hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight
    pub learning_rate: f64,
    /// Fraction of rows sampled for each tree
    pub subsample: f64,
    /// Fraction of features sampled for each tree
    pub colsample_bytree: f64,
    /// Minimum loss reduction required to split a node
    pub gamma: f64,
    /// L2 regularisation on leaf weights
    pub lambda: f64,
    /// Minimum hessian sum in each child
    pub min_child_weight: f64,
    /// Upper bound on histogram bins per feature
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            gamma: 0.0,
            lambda: 1.0,
            min_child_weight: 1.0,
            max_bins: 256,
            seed: 0,
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(HousingError::validation("n_estimators must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(HousingError::validation("learning_rate must be positive"));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(HousingError::validation(format!("{name} must be in (0, 1]")));
            }
        }
        if self.gamma < 0.0 || self.lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(HousingError::validation("gamma, lambda and min_child_weight must not be negative"));
        }
        if !(2..=u16::MAX as usize).contains(&self.max_bins) {
            return Err(HousingError::validation("max_bins must be between 2 and 65535"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] < threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One regression tree stored as a flat node list, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    index = if row.get(*feature).is_some_and(|x| x < threshold) {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes.get(index) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Feature values bucketed once per training run
struct BinnedFeatures {
    /// Sorted cut points per feature; bin `b` holds values in `[cuts[b-1], cuts[b])`
    cuts: Vec<Vec<f64>>,
    /// Bin index per feature, per row
    bins: Vec<Vec<u16>>,
}

impl BinnedFeatures {
    fn build(features: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let mut cuts = Vec::with_capacity(n_features);
        let mut bins = Vec::with_capacity(n_features);

        for f in 0..n_features {
            let mut values: Vec<f64> = features.iter().map(|row| row[f]).collect();
            values.sort_by(f64::total_cmp);

            let mut distinct = values.clone();
            distinct.dedup();

            let feature_cuts: Vec<f64> = if distinct.len() <= max_bins {
                distinct.into_iter().skip(1).collect()
            } else {
                let mut quantiles: Vec<f64> = (1..max_bins)
                    .map(|i| values[i * values.len() / max_bins])
                    .collect();
                quantiles.dedup();
                // the smallest value never needs a cut below it
                quantiles.retain(|c| *c > values[0]);
                quantiles
            };

            let column = features
                .iter()
                .map(|row| feature_cuts.partition_point(|c| *c <= row[f]) as u16)
                .collect();
            cuts.push(feature_cuts);
            bins.push(column);
        }

        Self { cuts, bins }
    }
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows one tree over a row sample
struct TreeBuilder<'a> {
    data: &'a BinnedFeatures,
    gradients: &'a [f64],
    hessians: &'a [f64],
    features: Vec<usize>,
    params: &'a BoosterParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for &f in &self.features {
            let n_bins = self.data.cuts[f].len() + 1;
            if n_bins < 2 {
                continue;
            }
            let mut grad_hist = vec![0.0; n_bins];
            let mut hess_hist = vec![0.0; n_bins];
            for &r in rows {
                let b = self.data.bins[f][r] as usize;
                grad_hist[b] += self.gradients[r];
                hess_hist[b] += self.hessians[r];
            }

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for b in 0..n_bins - 1 {
                g_left += grad_hist[b];
                h_left += hess_hist[b];
                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.params.gamma;
                if gain > 0.0 && best.as_ref().is_none_or(|s| gain > s.gain) {
                    best = Some(SplitCandidate { feature: f, bin: b, gain });
                }
            }
        }
        best
    }

    /// Append the subtree for `rows` and return its node index
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.gradients[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hessians[r]).sum();
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_weight(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return index;
        }
        let Some(split) = self.best_split(&rows, g, h) else {
            return index;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| (self.data.bins[split.feature][r] as usize) <= split.bin);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: self.data.cuts[split.feature][split.bin],
            left,
            right,
        };
        index
    }
}

/// A trained boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoosterParams,
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit on row-major `features` against `targets`
    pub fn fit(features: &[Vec<f64>], targets: &[f64], params: BoosterParams) -> Result<Self> {
        params.validate()?;
        if features.is_empty() {
            return Err(HousingError::model("cannot train on an empty dataset"));
        }
        if features.len() != targets.len() {
            return Err(HousingError::model(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        let n_features = features[0].len();
        if n_features == 0 || features.iter().any(|row| row.len() != n_features) {
            return Err(HousingError::model("feature rows must share one non-zero width"));
        }
        if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(HousingError::model("training data contains non-finite values"));
        }

        let n_rows = features.len();
        let base_score = targets.iter().sum::<f64>() / n_rows as f64;
        let data = BinnedFeatures::build(features, n_features, params.max_bins);
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut predictions = vec![base_score; n_rows];
        let hessians = vec![1.0; n_rows];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let n_sampled_features = ((params.colsample_bytree * n_features as f64).round() as usize).clamp(1, n_features);
        let mut feature_order: Vec<usize> = (0..n_features).collect();

        for round in 0..params.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(pred, y)| pred - y)
                .collect();

            let mut rows: Vec<usize> = if params.subsample < 1.0 {
                (0..n_rows)
                    .filter(|_| rng.random::<f64>() < params.subsample)
                    .collect()
            } else {
                (0..n_rows).collect()
            };
            if rows.is_empty() {
                rows = (0..n_rows).collect();
            }

            feature_order.shuffle(&mut rng);
            let mut sampled = feature_order[..n_sampled_features].to_vec();
            sampled.sort_unstable();

            let mut builder = TreeBuilder {
                data: &data,
                gradients: &gradients,
                hessians: &hessians,
                features: sampled,
                params: &params,
                nodes: Vec::new(),
            };
            builder.grow(rows, 0);
            let tree = RegressionTree { nodes: builder.nodes };

            for (pred, row) in predictions.iter_mut().zip(features) {
                *pred += tree.predict(row);
            }
            if round % 100 == 0 {
                debug!(round, leaves = tree.n_leaves(), "boosting round");
            }
            trees.push(tree);
        }

        Ok(Self {
            params,
            base_score,
            n_features,
            trees,
        })
    }

    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    #[must_use]
    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    #[must_use]
    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

/// Regression quality of a set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// `None` for empty or mismatched inputs
    #[must_use]
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Option<Self> {
        let n = y_true.len();
        if n == 0 || n != y_pred.len() {
            return None;
        }
        let mse = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n as f64;
        let mae = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n as f64;

        let mean = y_true.iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
        let r2 = if ss_tot != 0.0 {
            1.0 - mse * n as f64 / ss_tot
        } else {
            0.0
        };

        Some(Self {
            rmse: mse.sqrt(),
            mae,
            r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 3·x0 + step(x1) over a small grid
    fn synthetic() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..20 {
            for j in 0..5 {
                let x0 = f64::from(i);
                let x1 = f64::from(j);
                features.push(vec![x0, x1, 1.0]);
                targets.push(3.0 * x0 + if j >= 3 { 50.0 } else { 0.0 });
            }
        }
        (features, targets)
    }

    #[test]
    fn test_fit_reduces_error() {
        let (features, targets) = synthetic();
        let params = BoosterParams {
            n_estimators: 50,
            max_depth: 4,
            learning_rate: 0.3,
            ..BoosterParams::default()
        };
        let model = GradientBoostedTrees::fit(&features, &targets, params).unwrap();
        let metrics = RegressionMetrics::compute(&targets, &model.predict_many(&features)).unwrap();

        let baseline = RegressionMetrics::compute(&targets, &vec![model.base_score; targets.len()]).unwrap();
        assert!(metrics.rmse < baseline.rmse / 5.0, "rmse {} vs {}", metrics.rmse, baseline.rmse);
        assert!(metrics.r2 > 0.95);
        assert_eq!(model.trees().len(), 50);
        assert!(model.trees().iter().all(|t| t.depth() <= 4));
    }

    #[test]
    fn test_training_is_deterministic() {
        let (features, targets) = synthetic();
        let params = BoosterParams {
            n_estimators: 20,
            subsample: 0.6,
            colsample_bytree: 0.6,
            seed: 7,
            ..BoosterParams::default()
        };
        let a = GradientBoostedTrees::fit(&features, &targets, params).unwrap();
        let b = GradientBoostedTrees::fit(&features, &targets, params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_large_gamma_keeps_stumps() {
        let (features, targets) = synthetic();
        let params = BoosterParams {
            n_estimators: 3,
            gamma: 1e12,
            ..BoosterParams::default()
        };
        let model = GradientBoostedTrees::fit(&features, &targets, params).unwrap();
        assert!(model.trees().iter().all(|t| t.n_leaves() == 1));
    }

    #[test]
    fn test_quantile_bins_are_capped() {
        let features: Vec<Vec<f64>> = (0..1000).map(|i| vec![f64::from(i)]).collect();
        let binned = BinnedFeatures::build(&features, 1, 16);
        assert!(binned.cuts[0].len() < 16);
        assert!(binned.bins[0].iter().all(|b| (*b as usize) <= binned.cuts[0].len()));
        assert_eq!(binned.bins[0][0], 0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let params = BoosterParams::default();
        assert!(GradientBoostedTrees::fit(&[], &[], params).is_err());
        assert!(GradientBoostedTrees::fit(&[vec![1.0]], &[1.0, 2.0], params).is_err());
        assert!(GradientBoostedTrees::fit(&[vec![f64::NAN]], &[1.0], params).is_err());
        let bad = BoosterParams {
            subsample: 0.0,
            ..params
        };
        assert!(GradientBoostedTrees::fit(&[vec![1.0]], &[1.0], bad).is_err());
    }

    #[test]
    fn test_metrics() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
        assert!(RegressionMetrics::compute(&[], &[]).is_none());
    }
}
