//! Feature materialization for the probability model.
//!
//! The 19-slot layout is a public contract shared by trainer and predictor.
//! Optionals become numbers only here, at the boundary: anything missing maps
//! to the sentinel -1.0, which sits outside every legitimate range (rates in
//! [0, 1], positions >= 1, ages >= 2, imposts >= 48).

use chrono::NaiveDate;

use crate::factors::FactorScores;
use crate::types::PastPerformance;

/// Number of model features.
pub const NUM_FEATURES: usize = 19;

/// Sentinel encoding a missing value.
pub const MISSING_FEATURE: f32 = -1.0;

/// Feature names in model input order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    // factor scores (7)
    "past_results_score",
    "course_fit_score",
    "time_index_score",
    "last_3f_score",
    "popularity_score",
    "pedigree_score",
    "running_style_score",
    // raw race data (8)
    "odds",
    "popularity",
    "weight",
    "weight_diff",
    "age",
    "impost",
    "horse_number",
    "field_size",
    // derived history stats (4)
    "win_rate",
    "top3_rate",
    "avg_finish_position",
    "days_since_last_race",
];

/// Raw per-entry race data feeding slots 8-15.
#[derive(Debug, Clone, Default)]
pub struct RawEntryData {
    pub odds: Option<f64>,
    pub popularity: Option<u32>,
    pub weight: Option<u32>,
    pub weight_diff: Option<i32>,
    pub age: Option<u32>,
    pub impost: Option<f64>,
    pub horse_number: u32,
    pub field_size: u32,
}

/// Derived statistics over a horse's past performances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PastStats {
    pub win_rate: Option<f64>,
    pub top3_rate: Option<f64>,
    pub avg_finish_position: Option<f64>,
    pub days_since_last_race: Option<i64>,
}

/// Compute the derived history stats for one horse. Past performances are
/// most recent first; DNFs stay in the run count but out of the average
/// finish position.
pub fn past_stats(past: &[PastPerformance], current_date: NaiveDate) -> PastStats {
    if past.is_empty() {
        return PastStats::default();
    }

    let total = past.len();
    let wins = past.iter().filter(|r| r.finish_position == 1).count();
    let top3 = past
        .iter()
        .filter(|r| (1..=3).contains(&r.finish_position))
        .count();
    let positions: Vec<u32> = past
        .iter()
        .filter(|r| r.finish_position > 0)
        .map(|r| r.finish_position)
        .collect();

    let avg_finish = if positions.is_empty() {
        None
    } else {
        Some(positions.iter().sum::<u32>() as f64 / positions.len() as f64)
    };

    PastStats {
        win_rate: Some(wins as f64 / total as f64),
        top3_rate: Some(top3 as f64 / total as f64),
        avg_finish_position: avg_finish,
        days_since_last_race: Some((current_date - past[0].race_date).num_days()),
    }
}

/// Assemble the 19-slot feature vector.
pub fn build_features(
    scores: &FactorScores,
    raw: &RawEntryData,
    stats: &PastStats,
) -> [f32; NUM_FEATURES] {
    fn opt(value: Option<f64>) -> f32 {
        value.map(|v| v as f32).unwrap_or(MISSING_FEATURE)
    }

    [
        opt(scores.past_results),
        opt(scores.course_fit),
        opt(scores.time_index),
        opt(scores.last_3f),
        opt(scores.popularity),
        opt(scores.pedigree),
        opt(scores.running_style),
        opt(raw.odds),
        opt(raw.popularity.map(f64::from)),
        opt(raw.weight.map(f64::from)),
        opt(raw.weight_diff.map(f64::from)),
        opt(raw.age.map(f64::from)),
        opt(raw.impost),
        raw.horse_number as f32,
        raw.field_size as f32,
        opt(stats.win_rate),
        opt(stats.top3_rate),
        opt(stats.avg_finish_position),
        opt(stats.days_since_last_race.map(|d| d as f64)),
    ]
}
