//! Per-race prediction pipeline: factors, weighted total, features, model
//! probability, combined score and final ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use ndarray::Array2;
use tracing::debug;

use crate::constants::MAX_PAST_RESULTS_PER_HORSE;
use crate::factors::{self, FactorContext, FactorScores};
use crate::features::{self, RawEntryData, NUM_FEATURES};
use crate::ml::Predictor;
use crate::score::FactorWeights;
use crate::storage::{HorseSource, PastResultsSource};
use crate::types::{Horse, PastPerformance, RaceEntry, ShutubaData};

/// Prediction for one horse in one race.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub horse_number: u32,
    pub horse_name: String,
    pub horse_id: String,
    pub ml_probability: f64,
    pub factor_scores: FactorScores,
    pub total_score: Option<f64>,
    pub combined_score: Option<f64>,
    pub rank: u32,
}

/// Geometric mean of the normalized model probability and the factor total.
///
/// With no model signal in the race (`max_ml` 0) the combined score is the
/// factor total; a missing total stays missing.
pub fn combined_score(ml: f64, max_ml: f64, total_score: Option<f64>) -> Option<f64> {
    let total = total_score?;
    if max_ml <= 0.0 {
        return Some(total);
    }
    let normalized_ml = ml / max_ml * 100.0;
    Some((normalized_ml * total).sqrt())
}

/// Runs the prediction pipeline over a race card.
pub struct PredictionService<'a, R> {
    repo: &'a R,
    predictor: Option<&'a Predictor>,
    weights: FactorWeights,
    max_past_results: usize,
}

impl<'a, R> PredictionService<'a, R>
where
    R: PastResultsSource + HorseSource,
{
    pub fn new(repo: &'a R) -> Self {
        PredictionService {
            repo,
            predictor: None,
            weights: FactorWeights::default(),
            max_past_results: MAX_PAST_RESULTS_PER_HORSE,
        }
    }

    pub fn with_predictor(mut self, predictor: Option<&'a Predictor>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_weights(mut self, weights: FactorWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_past_results(mut self, limit: usize) -> Self {
        self.max_past_results = limit;
        self
    }

    /// Predict a race card, fetching histories and horse masters from the
    /// repository. Past results are cut off strictly before the race date.
    pub fn predict_race(&self, shutuba: &ShutubaData) -> Result<Vec<PredictionResult>> {
        let horse_ids: Vec<String> = shutuba
            .entries
            .iter()
            .map(|e| e.horse_id.clone())
            .collect();

        let mut past_map = HashMap::with_capacity(horse_ids.len());
        for horse_id in &horse_ids {
            let past = self
                .repo
                .past_results(horse_id, shutuba.date, self.max_past_results)?;
            past_map.insert(horse_id.clone(), past);
        }
        let horses = self.repo.horses_batch(&horse_ids)?;

        Ok(self.predict_prepared(shutuba, &past_map, &horses))
    }

    /// Predict with histories and horse masters already in hand (the batched
    /// path used by backtest and simulation).
    pub fn predict_prepared(
        &self,
        shutuba: &ShutubaData,
        past_map: &HashMap<String, Vec<PastPerformance>>,
        horses: &HashMap<String, Horse>,
    ) -> Vec<PredictionResult> {
        let field_size = shutuba.entries.len() as u32;
        static EMPTY: Vec<PastPerformance> = Vec::new();

        let mut predictions = Vec::with_capacity(shutuba.entries.len());
        let mut feature_rows: Vec<[f32; NUM_FEATURES]> = Vec::new();

        for entry in &shutuba.entries {
            let past = past_map.get(&entry.horse_id).unwrap_or(&EMPTY);
            let horse = horses.get(&entry.horse_id);

            let ctx = entry_context(shutuba, entry, horse, field_size);
            let scores = factors::calculate_all(past, &ctx);
            let total_score = self.weights.weighted_total(&scores);

            if self.predictor.is_some() {
                let stats = features::past_stats(past, shutuba.date);
                let raw = RawEntryData {
                    odds: entry.odds,
                    popularity: entry.popularity,
                    weight: entry.weight,
                    weight_diff: entry.weight_diff,
                    age: entry.age,
                    impost: Some(entry.impost),
                    horse_number: entry.horse_number,
                    field_size,
                };
                feature_rows.push(features::build_features(&scores, &raw, &stats));
            }

            predictions.push(PredictionResult {
                horse_number: entry.horse_number,
                horse_name: entry.horse_name.clone(),
                horse_id: entry.horse_id.clone(),
                ml_probability: 0.0,
                factor_scores: scores,
                total_score,
                combined_score: None,
                rank: 0,
            });
        }

        if let Some(predictor) = self.predictor {
            if !feature_rows.is_empty() {
                let mut matrix = Array2::<f32>::zeros((feature_rows.len(), NUM_FEATURES));
                for (i, row) in feature_rows.iter().enumerate() {
                    for (j, value) in row.iter().enumerate() {
                        matrix[[i, j]] = *value;
                    }
                }
                let probs = predictor.predict_probabilities(&matrix);
                for (prediction, prob) in predictions.iter_mut().zip(probs) {
                    prediction.ml_probability = prob;
                }
            }
        } else {
            debug!(race_id = %shutuba.race_id, "no model loaded, factor-only prediction");
        }

        let max_ml = predictions
            .iter()
            .map(|p| p.ml_probability)
            .fold(0.0, f64::max);
        for prediction in &mut predictions {
            prediction.combined_score =
                combined_score(prediction.ml_probability, max_ml, prediction.total_score);
        }

        rank_predictions(&mut predictions);
        predictions
    }
}

fn entry_context(
    shutuba: &ShutubaData,
    entry: &RaceEntry,
    horse: Option<&Horse>,
    field_size: u32,
) -> FactorContext {
    FactorContext {
        surface: Some(shutuba.surface),
        distance: Some(shutuba.distance),
        track_condition: shutuba.track_condition,
        venue: shutuba.venue.clone(),
        sire: horse.and_then(|h| h.sire.clone()),
        dam_sire: horse.and_then(|h| h.dam_sire.clone()),
        odds: entry.odds,
        popularity: entry.popularity,
        field_size,
        style_rates: None,
    }
}

/// Sort by combined score descending; ties resolve to the higher model
/// probability, then the lower horse number. Assigns 1-based ranks.
fn rank_predictions(predictions: &mut [PredictionResult]) {
    predictions.sort_by(|a, b| {
        let by_combined = match (a.combined_score, b.combined_score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_combined
            .then_with(|| {
                b.ml_probability
                    .partial_cmp(&a.ml_probability)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.horse_number.cmp(&b.horse_number))
    });

    for (i, prediction) in predictions.iter_mut().enumerate() {
        prediction.rank = (i + 1) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Surface, TrackCondition};
    use chrono::NaiveDate;

    /// In-memory repository double.
    struct FakeRepo {
        past: HashMap<String, Vec<PastPerformance>>,
        horses: HashMap<String, Horse>,
    }

    impl PastResultsSource for FakeRepo {
        fn past_results(
            &self,
            horse_id: &str,
            before: NaiveDate,
            limit: usize,
        ) -> Result<Vec<PastPerformance>> {
            Ok(self
                .past
                .get(horse_id)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| r.race_date < before)
                        .take(limit)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    impl HorseSource for FakeRepo {
        fn horses_batch(&self, horse_ids: &[String]) -> Result<HashMap<String, Horse>> {
            Ok(horse_ids
                .iter()
                .filter_map(|id| self.horses.get(id).cloned().map(|h| (id.clone(), h)))
                .collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(horse_id: &str, number: u32) -> RaceEntry {
        RaceEntry {
            horse_id: horse_id.to_string(),
            horse_name: format!("馬{number}"),
            horse_number: number,
            bracket_number: (number + 1) / 2,
            jockey_id: format!("j{number}"),
            jockey_name: format!("騎手{number}"),
            impost: 57.0,
            sex: None,
            age: Some(4),
            odds: None,
            popularity: None,
            weight: None,
            weight_diff: None,
        }
    }

    fn shutuba(entries: Vec<RaceEntry>) -> ShutubaData {
        ShutubaData {
            race_id: "202605021105".to_string(),
            race_name: "テストステークス".to_string(),
            race_number: 11,
            venue: "東京".to_string(),
            distance: 2000,
            surface: Surface::Turf,
            track_condition: TrackCondition::Good,
            date: date(2026, 5, 10),
            entries,
        }
    }

    fn past_run(days_before: i64, position: u32) -> PastPerformance {
        PastPerformance {
            race_id: "202604010101".to_string(),
            race_date: date(2026, 5, 10) - chrono::Duration::days(days_before),
            venue: "東京".to_string(),
            surface: Surface::Turf,
            distance: 2000,
            track_condition: TrackCondition::Good,
            finish_position: position,
            field_size: 10,
            finish_time: Some(120.0),
            last_3f: Some(34.0),
            odds: None,
            popularity: None,
            passing_order: Some("2-2-2-2".to_string()),
        }
    }

    #[test]
    fn test_combined_score_geometric_mean() {
        // normalized ml = 0.2/0.4*100 = 50; sqrt(50 * 72) = 60
        let combined = combined_score(0.2, 0.4, Some(72.0)).unwrap();
        assert!((combined - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_combined_score_without_model_is_total() {
        assert_eq!(combined_score(0.0, 0.0, Some(64.0)), Some(64.0));
    }

    #[test]
    fn test_combined_score_missing_total_is_missing() {
        assert_eq!(combined_score(0.5, 0.5, None), None);
    }

    #[test]
    fn test_factor_only_prediction_ranks_by_total() {
        let mut past = HashMap::new();
        // horse a: recent winner; horse b: tail-ender
        past.insert("a".to_string(), vec![past_run(30, 1), past_run(60, 1)]);
        past.insert("b".to_string(), vec![past_run(30, 9), past_run(60, 10)]);
        let repo = FakeRepo {
            past,
            horses: HashMap::new(),
        };

        let service = PredictionService::new(&repo);
        let results = service
            .predict_race(&shutuba(vec![entry("a", 1), entry("b", 2)]))
            .unwrap();

        assert_eq!(results[0].horse_id, "a");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
        assert!(results[0].combined_score.unwrap() > results[1].combined_score.unwrap());
        // without a model the combined score equals the factor total
        assert_eq!(results[0].combined_score, results[0].total_score);
    }

    #[test]
    fn test_empty_history_yields_missing_scores_not_failure() {
        let repo = FakeRepo {
            past: HashMap::new(),
            horses: HashMap::new(),
        };
        let service = PredictionService::new(&repo);
        let results = service
            .predict_race(&shutuba(vec![entry("a", 1), entry("b", 2)]))
            .unwrap();

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.factor_scores.all_missing());
            assert_eq!(result.total_score, None);
            assert_eq!(result.combined_score, None);
            assert_eq!(result.ml_probability, 0.0);
        }
        // missing combined scores fall back to horse-number order
        assert_eq!(results[0].horse_number, 1);
    }

    #[test]
    fn test_tie_breaks_by_lower_horse_number() {
        let mut past = HashMap::new();
        past.insert("a".to_string(), vec![past_run(30, 2)]);
        past.insert("b".to_string(), vec![past_run(30, 2)]);
        let repo = FakeRepo {
            past,
            horses: HashMap::new(),
        };
        let service = PredictionService::new(&repo);

        // identical history, identical scores: horse 3 vs horse 7
        let results = service
            .predict_race(&shutuba(vec![entry("b", 7), entry("a", 3)]))
            .unwrap();
        assert_eq!(results[0].horse_number, 3);
        assert_eq!(results[1].horse_number, 7);
    }

    #[test]
    fn test_leak_free_cutoff_applies() {
        let mut past = HashMap::new();
        // one run ON the race date must be invisible
        past.insert("a".to_string(), vec![past_run(0, 1)]);
        let repo = FakeRepo {
            past,
            horses: HashMap::new(),
        };
        let service = PredictionService::new(&repo);
        let results = service.predict_race(&shutuba(vec![entry("a", 1)])).unwrap();
        assert!(results[0].factor_scores.all_missing());
    }

    #[test]
    fn test_pedigree_context_flows_from_horse_master() {
        let mut horses = HashMap::new();
        horses.insert(
            "a".to_string(),
            Horse {
                id: "a".to_string(),
                name: "馬1".to_string(),
                sex: None,
                birth_year: Some(2022),
                sire: Some("サンデーサイレンス".to_string()),
                dam_sire: Some("ストームキャット".to_string()),
            },
        );
        let repo = FakeRepo {
            past: HashMap::new(),
            horses,
        };
        let service = PredictionService::new(&repo);
        let results = service.predict_race(&shutuba(vec![entry("a", 1)])).unwrap();

        // 2000 m turf good: 0.7*1.0 + 0.3*0.6 = 0.88 distance, 1.0 track -> 94.0
        let pedigree = results[0].factor_scores.pedigree.unwrap();
        assert!((pedigree - 94.0).abs() < 1e-9);
    }
}
