//! Model training with stratified cross-validation.
//!
//! The classifier predicts P(finish in top 3). Labels: 1 for finish
//! positions 1-3, 0 otherwise; DNFs never become samples.

use std::collections::HashMap;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::MIN_TRAINING_SAMPLES;
use crate::error::KeibaError;

/// Seed for the shuffled K-fold split.
const CV_SEED: u64 = 42;

/// Gradient boosting hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingParams {
    pub iterations: usize,
    pub shrinkage: f32,
    /// Tree depth; 5 corresponds to the 31-leaf profile, 4 to the 15-leaf
    /// lightweight profile.
    pub max_depth: u32,
    pub feature_sample_ratio: f64,
    pub data_sample_ratio: f64,
}

impl TrainingParams {
    /// Full-size profile for offline training.
    pub fn normal() -> Self {
        TrainingParams {
            iterations: 100,
            shrinkage: 0.05,
            max_depth: 5,
            feature_sample_ratio: 0.9,
            data_sample_ratio: 0.8,
        }
    }

    /// Cheaper profile for walk-forward retraining.
    pub fn lightweight() -> Self {
        TrainingParams {
            iterations: 50,
            shrinkage: 0.10,
            max_depth: 4,
            feature_sample_ratio: 0.9,
            data_sample_ratio: 0.8,
        }
    }
}

/// How Precision@K was computed for a metrics bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricGrouping {
    /// Top-K over the whole holdout.
    Global,
    /// Top-K within each race group, averaged over groups.
    RaceGrouped,
}

/// Cross-validation metrics, averaged over folds.
#[derive(Debug, Clone)]
pub struct CvMetrics {
    pub precision_at_1: Option<f64>,
    pub precision_at_3: Option<f64>,
    pub auc: Option<f64>,
    pub log_loss: Option<f64>,
    pub grouping: MetricGrouping,
}

/// A fitted classifier plus the feature width it was trained with.
#[derive(Serialize, Deserialize)]
pub struct TrainedModel {
    pub(crate) model: GBDT,
    pub num_features: usize,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("num_features", &self.num_features)
            .finish()
    }
}

impl TrainedModel {
    /// Predict P(top 3) for each row of the feature matrix.
    pub fn predict_probabilities(&self, features: &Array2<f32>) -> Vec<f64> {
        let test_data: DataVec = features
            .rows()
            .into_iter()
            .map(|row| Data::new_test_data(row.to_vec(), None))
            .collect();
        self.model
            .predict(&test_data)
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect()
    }
}

/// Trainer for the top-3 probability classifier.
pub struct Trainer {
    params: TrainingParams,
    min_samples: usize,
}

impl Trainer {
    pub fn new(params: TrainingParams) -> Self {
        Trainer {
            params,
            min_samples: MIN_TRAINING_SAMPLES,
        }
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    fn config(&self, feature_size: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(feature_size);
        cfg.set_max_depth(self.params.max_depth);
        cfg.set_iterations(self.params.iterations);
        cfg.set_shrinkage(self.params.shrinkage);
        cfg.set_feature_sample_ratio(self.params.feature_sample_ratio);
        cfg.set_data_sample_ratio(self.params.data_sample_ratio);
        cfg.set_loss("LogLikelyhood");
        cfg.set_debug(false);
        cfg.set_training_optimization_level(2);
        cfg
    }

    fn fit_subset(&self, x: &Array2<f32>, y: &[u8], indices: &[usize]) -> GBDT {
        let mut training: DataVec = indices
            .iter()
            .map(|&i| {
                // LogLikelyhood loss wants labels in {1, -1}
                let label = if y[i] == 1 { 1.0 } else { -1.0 };
                Data::new_training_data(x.row(i).to_vec(), 1.0, label, None)
            })
            .collect();

        let mut model = GBDT::new(&self.config(x.ncols()));
        model.fit(&mut training);
        model
    }

    /// Fit on the full data set. Errors with `InsufficientTrainingData` below
    /// the configured minimum.
    pub fn fit(&self, x: &Array2<f32>, y: &[u8]) -> Result<TrainedModel, KeibaError> {
        if x.nrows() < self.min_samples {
            return Err(KeibaError::InsufficientTrainingData {
                actual: x.nrows(),
                required: self.min_samples,
            });
        }

        let all: Vec<usize> = (0..x.nrows()).collect();
        let model = self.fit_subset(x, y, &all);
        Ok(TrainedModel {
            model,
            num_features: x.ncols(),
        })
    }

    /// Stratified K-fold cross-validation, then a refit on all data.
    ///
    /// `groups` carries the race id per sample; when present, Precision@K is
    /// race-grouped, otherwise it is computed over each whole holdout. A
    /// fold's AUC is dropped when its holdout is single-class.
    pub fn fit_with_cv(
        &self,
        x: &Array2<f32>,
        y: &[u8],
        groups: Option<&[String]>,
        n_splits: usize,
    ) -> Result<(TrainedModel, CvMetrics), KeibaError> {
        if x.nrows() < self.min_samples {
            return Err(KeibaError::InsufficientTrainingData {
                actual: x.nrows(),
                required: self.min_samples,
            });
        }

        let folds = stratified_kfold(y, n_splits, CV_SEED);

        let mut p1_scores = Vec::new();
        let mut p3_scores = Vec::new();
        let mut auc_scores = Vec::new();
        let mut logloss_scores = Vec::new();

        for (fold, holdout) in folds.iter().enumerate() {
            let train: Vec<usize> = (0..x.nrows()).filter(|i| !holdout.contains(i)).collect();
            let model = self.fit_subset(x, y, &train);

            let holdout_rows: DataVec = holdout
                .iter()
                .map(|&i| Data::new_test_data(x.row(i).to_vec(), None))
                .collect();
            let probs: Vec<f64> = model
                .predict(&holdout_rows)
                .into_iter()
                .map(|p| (p as f64).clamp(0.0, 1.0))
                .collect();
            let labels: Vec<u8> = holdout.iter().map(|&i| y[i]).collect();

            match groups {
                Some(groups) => {
                    let fold_groups: Vec<&str> =
                        holdout.iter().map(|&i| groups[i].as_str()).collect();
                    p1_scores.push(grouped_precision_at_k(&labels, &probs, &fold_groups, 1));
                    p3_scores.push(grouped_precision_at_k(&labels, &probs, &fold_groups, 3));
                }
                None => {
                    p1_scores.push(precision_at_k(&labels, &probs, 1));
                    p3_scores.push(precision_at_k(&labels, &probs, 3));
                }
            }

            if let Some(auc) = auc(&labels, &probs) {
                auc_scores.push(auc);
            } else {
                debug!("fold {fold} holdout is single-class, AUC dropped");
            }
            logloss_scores.push(log_loss(&labels, &probs));
        }

        let model = self.fit(x, y)?;
        let metrics = CvMetrics {
            precision_at_1: mean(&p1_scores),
            precision_at_3: mean(&p3_scores),
            auc: mean(&auc_scores),
            log_loss: mean(&logloss_scores),
            grouping: if groups.is_some() {
                MetricGrouping::RaceGrouped
            } else {
                MetricGrouping::Global
            },
        };

        Ok((model, metrics))
    }
}

/// Deal each class's shuffled indices round-robin into `k` folds.
fn stratified_kfold(y: &[u8], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let mut positives: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 1).collect();
    let mut negatives: Vec<usize> = (0..y.len()).filter(|&i| y[i] != 1).collect();
    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); k];
    for (pos, &i) in positives.iter().chain(negatives.iter()).enumerate() {
        folds[pos % k].push(i);
    }
    folds
}

/// Share of positive labels among the top-k predictions of the holdout.
fn precision_at_k(labels: &[u8], probs: &[f64], k: usize) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let k = k.min(labels.len());
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(std::cmp::Ordering::Equal));
    let hits: u32 = order[..k].iter().map(|&i| labels[i] as u32).sum();
    hits as f64 / k as f64
}

/// Precision@K per race group, averaged over groups.
fn grouped_precision_at_k(labels: &[u8], probs: &[f64], groups: &[&str], k: usize) -> f64 {
    let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, group) in groups.iter().copied().enumerate() {
        by_group.entry(group).or_default().push(i);
    }
    if by_group.is_empty() {
        return 0.0;
    }

    let total: f64 = by_group
        .values()
        .map(|members| {
            let member_labels: Vec<u8> = members.iter().map(|&i| labels[i]).collect();
            let member_probs: Vec<f64> = members.iter().map(|&i| probs[i]).collect();
            precision_at_k(&member_labels, &member_probs, k)
        })
        .sum();
    total / by_group.len() as f64
}

/// Rank-statistic AUC. `None` when the holdout is single-class.
fn auc(labels: &[u8], probs: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| probs[a].partial_cmp(&probs[b]).unwrap_or(std::cmp::Ordering::Equal));

    // mid-ranks for ties
    let mut ranks = vec![0.0; labels.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let mid_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = mid_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Mean binary cross-entropy with probability clamping.
fn log_loss(labels: &[u8], probs: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .zip(probs)
        .map(|(&label, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if label == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
