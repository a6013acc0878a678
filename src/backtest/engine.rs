//! Walk-forward backtest engine.
//!
//! Processes the window's races in ascending (date, race number) order,
//! retraining at the configured cadence with a training cutoff strictly
//! before the current race. Results stream from a lazy iterator; nothing is
//! materialized beyond the per-race working set, and dropping the iterator
//! releases the database session.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::backtest::cache::CachedFactorCalculator;
use crate::backtest::metrics::{BacktestPrediction, RaceBacktestResult};
use crate::config::{BacktestConfig, RetrainInterval};
use crate::constants::DEFAULT_FINISH_POSITION;
use crate::factors::FactorContext;
use crate::features::{self, RawEntryData, NUM_FEATURES};
use crate::ml::{Predictor, Trainer, TrainingParams};
use crate::score::FactorWeights;
use crate::storage::RaceRepository;
use crate::types::{Race, RaceResult};

/// Retraining state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// The cadence floor has moved; the next race triggers a retrain.
    NeedsRetrain,
    /// A model trained before the current race is loaded.
    Ready,
    /// Too little history to train; inference is factor-only.
    Degraded,
}

/// Configures and launches walk-forward runs.
pub struct BacktestEngine {
    db_path: PathBuf,
    start_date: NaiveDate,
    end_date: NaiveDate,
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(db_path: &Path, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestEngine {
            db_path: db_path.to_path_buf(),
            start_date,
            end_date,
            config: BacktestConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BacktestConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the database and start streaming.
    pub fn run(&self) -> Result<BacktestRun> {
        let repo = RaceRepository::new(&self.db_path)?;
        BacktestRun::start(
            repo,
            self.start_date,
            self.end_date,
            self.config.clone(),
        )
    }
}

/// A streaming walk-forward run. Iterating yields one [`RaceBacktestResult`]
/// per race in ascending (date, race number) order.
pub struct BacktestRun {
    repo: RaceRepository,
    races: VecDeque<Race>,
    config: BacktestConfig,
    weights: FactorWeights,
    factors: CachedFactorCalculator,
    predictor: Option<Predictor>,
    last_train_date: Option<NaiveDate>,
    state: TrainingState,
}

impl BacktestRun {
    /// Start a run over an already-open repository.
    pub fn start(
        repo: RaceRepository,
        start_date: NaiveDate,
        end_date: NaiveDate,
        config: BacktestConfig,
    ) -> Result<Self> {
        let races = repo.fetch_races_in_window(start_date, end_date, None)?;
        info!(
            "backtest window {start_date}..{end_date}: {} races",
            races.len()
        );
        Ok(BacktestRun {
            repo,
            races: races.into(),
            config,
            weights: FactorWeights::default(),
            factors: CachedFactorCalculator::default(),
            predictor: None,
            last_train_date: None,
            state: TrainingState::NeedsRetrain,
        })
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    fn should_retrain(&self, race_date: NaiveDate) -> bool {
        let Some(last) = self.last_train_date else {
            return true;
        };
        match self.config.retrain_interval {
            RetrainInterval::Daily => race_date > last,
            RetrainInterval::Weekly => race_date.iso_week() != last.iso_week(),
            RetrainInterval::Monthly => {
                (race_date.year(), race_date.month()) != (last.year(), last.month())
            }
        }
    }

    /// Retrain on everything strictly before `cutoff`. Falls to Degraded when
    /// the history is too thin.
    fn retrain(&mut self, cutoff: NaiveDate) -> Result<()> {
        self.factors.clear();

        let (rows, labels) = self.build_training_data(cutoff)?;
        if rows.len() < self.config.min_training_samples {
            info!(
                "retrain at {cutoff}: {} samples < {}, running degraded",
                rows.len(),
                self.config.min_training_samples
            );
            self.predictor = None;
            self.state = TrainingState::Degraded;
            return Ok(());
        }

        let params = if self.config.lightweight_training {
            TrainingParams::lightweight()
        } else {
            TrainingParams::normal()
        };
        let trainer =
            Trainer::new(params).with_min_samples(self.config.min_training_samples);

        let mut matrix = Array2::<f32>::zeros((rows.len(), NUM_FEATURES));
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                matrix[[i, j]] = *value;
            }
        }

        let model = trainer.fit(&matrix, &labels)?;
        debug!("retrained at {cutoff} on {} samples", rows.len());
        self.predictor = Some(Predictor::new(model));
        self.state = TrainingState::Ready;
        Ok(())
    }

    /// Assemble (features, labels) from all races before the cutoff. Each
    /// race's horse histories come from one batched query bounded by that
    /// race's own date.
    fn build_training_data(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<(Vec<[f32; NUM_FEATURES]>, Vec<u8>)> {
        let mut rows = Vec::new();
        let mut labels = Vec::new();

        for race in self.repo.fetch_races_before(cutoff)? {
            let results = self.repo.fetch_race_results(&race.id)?;
            let runner_ids: Vec<String> = results
                .iter()
                .filter(|r| !r.is_dnf())
                .map(|r| r.horse_id.clone())
                .collect();
            if runner_ids.is_empty() {
                continue;
            }

            let past_map = self.repo.fetch_past_results_batch(
                &runner_ids,
                race.date,
                self.config.max_past_results_per_horse,
            )?;
            let horses = self.repo.fetch_horses_batch(&runner_ids)?;
            let field_size = results.len() as u32;

            for result in results.iter().filter(|r| !r.is_dnf()) {
                let past = past_map
                    .get(&result.horse_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let horse = horses.get(&result.horse_id);

                let ctx = FactorContext {
                    surface: Some(race.surface),
                    distance: Some(race.distance),
                    track_condition: race.track_condition,
                    venue: race.venue.clone(),
                    sire: horse.and_then(|h| h.sire.clone()),
                    dam_sire: horse.and_then(|h| h.dam_sire.clone()),
                    odds: result.odds,
                    popularity: result.popularity,
                    field_size,
                    style_rates: None,
                };
                let scores = self.factors.calculate(&result.horse_id, past, &ctx);
                let stats = features::past_stats(past, race.date);
                let raw = raw_entry(result, field_size);

                rows.push(features::build_features(&scores, &raw, &stats));
                labels.push((result.finish_position <= 3) as u8);
            }
        }

        Ok((rows, labels))
    }

    /// Score one race of the window. Histories are bounded by the race date;
    /// same-day rows never enter any feature.
    fn predict_race(&mut self, race: &Race) -> Result<RaceBacktestResult> {
        let results = self.repo.fetch_race_results(&race.id)?;
        let horse_ids: Vec<String> = results.iter().map(|r| r.horse_id.clone()).collect();

        let past_map = self.repo.fetch_past_results_batch(
            &horse_ids,
            race.date,
            self.config.max_past_results_per_horse,
        )?;
        let horses = self.repo.fetch_horses_batch(&horse_ids)?;
        let field_size = results.len() as u32;

        let mut total_scores: Vec<Option<f64>> = Vec::with_capacity(results.len());
        let mut feature_rows: Vec<[f32; NUM_FEATURES]> = Vec::new();

        for result in &results {
            let past = past_map
                .get(&result.horse_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let horse = horses.get(&result.horse_id);

            let ctx = FactorContext {
                surface: Some(race.surface),
                distance: Some(race.distance),
                track_condition: race.track_condition,
                venue: race.venue.clone(),
                sire: horse.and_then(|h| h.sire.clone()),
                dam_sire: horse.and_then(|h| h.dam_sire.clone()),
                odds: result.odds,
                popularity: result.popularity,
                field_size,
                style_rates: None,
            };
            let scores = self.factors.calculate(&result.horse_id, past, &ctx);
            total_scores.push(self.weights.weighted_total(&scores));

            if self.predictor.is_some() {
                let stats = features::past_stats(past, race.date);
                let raw = raw_entry(result, field_size);
                feature_rows.push(features::build_features(&scores, &raw, &stats));
            }
        }

        let ml_probs: Option<Vec<f64>> = self.predictor.as_ref().map(|predictor| {
            let mut matrix = Array2::<f32>::zeros((feature_rows.len(), NUM_FEATURES));
            for (i, row) in feature_rows.iter().enumerate() {
                for (j, value) in row.iter().enumerate() {
                    matrix[[i, j]] = *value;
                }
            }
            predictor.predict_probabilities(&matrix)
        });

        let factor_ranks = rank_desc(&total_scores);
        let ml_ranks: Vec<Option<u32>> = match &ml_probs {
            Some(probs) => {
                let probs: Vec<Option<f64>> = probs.iter().map(|p| Some(*p)).collect();
                rank_desc(&probs).into_iter().map(Some).collect()
            }
            None => vec![None; results.len()],
        };

        let predictions = results
            .iter()
            .enumerate()
            .map(|(i, result)| BacktestPrediction {
                horse_number: result.horse_number,
                horse_name: horses
                    .get(&result.horse_id)
                    .map(|h| h.name.clone())
                    .unwrap_or_else(|| result.horse_id.clone()),
                ml_probability: ml_probs.as_ref().map(|p| p[i]),
                ml_rank: ml_ranks[i],
                factor_rank: factor_ranks[i],
                actual_rank: if result.finish_position > 0 {
                    result.finish_position
                } else {
                    DEFAULT_FINISH_POSITION
                },
            })
            .collect();

        Ok(RaceBacktestResult {
            race_id: race.id.clone(),
            race_date: race.date,
            race_name: race.name.clone(),
            venue: race.venue.clone(),
            predictions,
        })
    }
}

impl Iterator for BacktestRun {
    type Item = Result<RaceBacktestResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let race = self.races.pop_front()?;

        if self.should_retrain(race.date) {
            if let Err(error) = self.retrain(race.date) {
                warn!("retrain before {} failed: {error:#}", race.id);
                self.predictor = None;
                self.state = TrainingState::Degraded;
            }
            self.last_train_date = Some(race.date);
        }

        Some(self.predict_race(&race))
    }
}

fn raw_entry(result: &RaceResult, field_size: u32) -> RawEntryData {
    RawEntryData {
        odds: result.odds,
        popularity: result.popularity,
        weight: result.weight,
        weight_diff: result.weight_diff,
        age: result.age,
        impost: result.impost,
        horse_number: result.horse_number,
        field_size,
    }
}

/// 1-based ranks by value descending; missing values rank last. Stable, so
/// ties keep input (horse number) order.
fn rank_desc(values: &[Option<f64>]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let a_value = values[a].unwrap_or(f64::NEG_INFINITY);
        let b_value = values[b].unwrap_or(f64::NEG_INFINITY);
        b_value
            .partial_cmp(&a_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0u32; values.len()];
    for (rank, &index) in order.iter().enumerate() {
        ranks[index] = (rank + 1) as u32;
    }
    ranks
}
