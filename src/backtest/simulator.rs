//! Shared machinery for the bet-ticket simulators.
//!
//! Each simulator owns one [`SimulatorCore`] for its lifetime: the database
//! handle, the optional model, and exactly one payout client whose rate
//! limiter paces every fetch of the period run.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::{ModelConfig, SimulatorConfig};
use crate::constants::MAX_PAST_RESULTS_PER_HORSE;
use crate::error::KeibaError;
use crate::ml::{self, Predictor};
use crate::payout::{PayoutClient, PayoutSource, RateLimiter};
use crate::prediction::{PredictionResult, PredictionService};
use crate::score::FactorWeights;
use crate::storage::RaceRepository;
use crate::types::{Race, RaceEntry, RaceId, RaceResult, ShutubaData};

/// Database handle, model and payout client shared by a simulator.
pub struct SimulatorCore {
    repo: RaceRepository,
    payouts: PayoutClient,
    predictor: Option<Predictor>,
    weights: FactorWeights,
    max_past_results: usize,
}

impl SimulatorCore {
    /// Open the database at `db_path` and wrap the given payout client.
    pub fn new(db_path: &Path, payouts: PayoutClient) -> Result<Self> {
        Ok(Self::with_repository(RaceRepository::new(db_path)?, payouts))
    }

    /// Build over an already-open repository (tests, shared handles).
    pub fn with_repository(repo: RaceRepository, payouts: PayoutClient) -> Self {
        SimulatorCore {
            repo,
            payouts,
            predictor: None,
            weights: FactorWeights::default(),
            max_past_results: MAX_PAST_RESULTS_PER_HORSE,
        }
    }

    /// Build from the configuration surface: pacing from `request_delay`,
    /// model from the explicit path or latest-by-mtime in the artifact
    /// directory.
    pub fn from_config(
        db_path: &Path,
        config: &SimulatorConfig,
        model: &ModelConfig,
        source: impl PayoutSource + 'static,
    ) -> Result<Self> {
        let client = PayoutClient::new(source, RateLimiter::from_delay_secs(config.request_delay));
        let core = Self::new(db_path, client)?;

        let explicit = config.model_path.as_deref().or(model.path.as_deref());
        match ml::resolve_model_path(&model.dir, explicit) {
            Some(path) => core.with_model_path(&path),
            None => Ok(core),
        }
    }

    /// Load a model artifact for ML-weighted selection.
    pub fn with_model_path(mut self, path: &Path) -> Result<Self> {
        let model = ml::load_model(path)?;
        self.predictor = Some(Predictor::new(model));
        Ok(self)
    }

    pub fn payouts(&self) -> &PayoutClient {
        &self.payouts
    }

    pub(crate) fn races_in_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        venues: Option<&[String]>,
    ) -> Result<Vec<Race>> {
        self.repo.fetch_races_in_window(from, to, venues)
    }

    /// Rebuild the race card from the recorded outcome and rank it with the
    /// prediction service. The synthetic entries carry pre-race fields only,
    /// so the service sees what it would have seen at post time.
    pub(crate) fn ranked_predictions(
        &self,
        race_id: &str,
    ) -> Result<(Race, Vec<PredictionResult>)> {
        RaceId::parse(race_id)?;

        let race = self
            .repo
            .fetch_race(race_id)?
            .ok_or_else(|| KeibaError::RaceNotFound(race_id.to_string()))?;
        let results = self.repo.fetch_race_results(race_id)?;

        let horse_ids: Vec<String> = results.iter().map(|r| r.horse_id.clone()).collect();
        let past_map = self.repo.fetch_past_results_batch(
            &horse_ids,
            race.date,
            self.max_past_results,
        )?;
        let horses = self.repo.fetch_horses_batch(&horse_ids)?;

        let shutuba = build_shutuba(&race, &results, &horses);
        let service = PredictionService::new(&self.repo)
            .with_predictor(self.predictor.as_ref())
            .with_weights(self.weights)
            .with_max_past_results(self.max_past_results);
        let predictions = service.predict_prepared(&shutuba, &past_map, &horses);

        Ok((race, predictions))
    }

    /// Horse numbers of the top `n` ranked predictions.
    pub(crate) fn top_numbers(predictions: &[PredictionResult], n: usize) -> Vec<u32> {
        predictions.iter().take(n).map(|p| p.horse_number).collect()
    }
}

fn build_shutuba(
    race: &Race,
    results: &[RaceResult],
    horses: &std::collections::HashMap<String, crate::types::Horse>,
) -> ShutubaData {
    let entries = results
        .iter()
        .map(|result| RaceEntry {
            horse_id: result.horse_id.clone(),
            horse_name: horses
                .get(&result.horse_id)
                .map(|h| h.name.clone())
                .unwrap_or_else(|| result.horse_id.clone()),
            horse_number: result.horse_number,
            bracket_number: result.bracket_number,
            jockey_id: result.jockey_id.clone().unwrap_or_default(),
            jockey_name: result.jockey_name.clone().unwrap_or_default(),
            impost: result.impost.unwrap_or(0.0),
            sex: result.sex.clone(),
            age: result.age,
            odds: result.odds,
            popularity: result.popularity,
            weight: result.weight,
            weight_diff: result.weight_diff,
        })
        .collect();

    ShutubaData {
        race_id: race.id.clone(),
        race_name: race.name.clone(),
        race_number: race.race_number,
        venue: race.venue.clone(),
        distance: race.distance,
        surface: race.surface,
        track_condition: race.track_condition,
        date: race.date,
        entries,
    }
}

/// Template for the four ticket simulators: the period loop and summary hook
/// are shared, selection and settlement are per-ticket.
#[async_trait]
pub trait TicketSimulator: Send + Sync {
    type RaceOutcome: Send;
    type Summary: Send;

    fn core(&self) -> &SimulatorCore;

    /// Simulate one race: select, settle against payouts, record.
    async fn simulate_race(&self, race_id: &str) -> Result<Self::RaceOutcome>;

    /// Aggregate a period's race outcomes.
    fn build_summary(
        &self,
        period_from: NaiveDate,
        period_to: NaiveDate,
        race_results: Vec<Self::RaceOutcome>,
    ) -> Self::Summary;

    /// Run every race in the window. Per-race failures are logged and
    /// skipped; the window never aborts.
    async fn simulate_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        venues: Option<&[String]>,
    ) -> Result<Self::Summary> {
        let races = self.core().races_in_window(from, to, venues)?;
        let mut outcomes = Vec::with_capacity(races.len());
        let mut failures = 0usize;

        for race in races {
            match self.simulate_race(&race.id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    failures += 1;
                    warn!("race {} simulation failed: {error:#}", race.id);
                }
            }
        }
        if failures > 0 {
            info!("{failures} races failed this run");
        }

        Ok(self.build_summary(from, to, outcomes))
    }
}

/// NaN-safe return rate: zero when nothing was invested.
pub(crate) fn return_rate(total_payout: u32, total_investment: u32) -> f64 {
    if total_investment > 0 {
        total_payout as f64 / total_investment as f64
    } else {
        0.0
    }
}
