//! The seven analytical factor calculators.
//!
//! Every factor shares the signature
//! `(&[PastPerformance], &FactorContext) -> Option<f64>`: a score in
//! [0, 100], or `None` when the factor's minimum data are absent. Factors
//! never substitute zero for missing; the aggregator re-normalizes over the
//! factors that produced a score.

pub mod course_fit;
pub mod last_3f;
pub mod past_results;
pub mod pedigree;
pub mod popularity;
pub mod running_style;
pub mod time_index;

use crate::types::{PastPerformance, Surface, TrackCondition};

pub use running_style::StyleRates;

/// Factor names in canonical order. This order is shared with the feature
/// vector and the weight table.
pub const FACTOR_NAMES: [&str; 7] = [
    "past_results",
    "course_fit",
    "time_index",
    "last_3f",
    "popularity",
    "pedigree",
    "running_style",
];

/// Everything a factor may need about the target race, in one typed record.
#[derive(Debug, Clone, Default)]
pub struct FactorContext {
    pub surface: Option<Surface>,
    pub distance: Option<u32>,
    pub track_condition: TrackCondition,
    pub venue: String,
    pub sire: Option<String>,
    pub dam_sire: Option<String>,
    /// Pre-race win odds of the horse in the target race.
    pub odds: Option<f64>,
    /// Pre-race popularity rank of the horse in the target race.
    pub popularity: Option<u32>,
    pub field_size: u32,
    /// Course-specific running-style win rates; defaults apply when absent.
    pub style_rates: Option<StyleRates>,
}

/// Scores of all seven factors for one horse. `None` means the factor could
/// not be computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FactorScores {
    pub past_results: Option<f64>,
    pub course_fit: Option<f64>,
    pub time_index: Option<f64>,
    pub last_3f: Option<f64>,
    pub popularity: Option<f64>,
    pub pedigree: Option<f64>,
    pub running_style: Option<f64>,
}

impl FactorScores {
    /// Iterate scores in canonical factor order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> {
        [
            ("past_results", self.past_results),
            ("course_fit", self.course_fit),
            ("time_index", self.time_index),
            ("last_3f", self.last_3f),
            ("popularity", self.popularity),
            ("pedigree", self.pedigree),
            ("running_style", self.running_style),
        ]
        .into_iter()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "past_results" => self.past_results,
            "course_fit" => self.course_fit,
            "time_index" => self.time_index,
            "last_3f" => self.last_3f,
            "popularity" => self.popularity,
            "pedigree" => self.pedigree,
            "running_style" => self.running_style,
            _ => None,
        }
    }

    pub fn all_missing(&self) -> bool {
        self.iter().all(|(_, score)| score.is_none())
    }
}

/// Compute all seven factors for one horse.
pub fn calculate_all(past: &[PastPerformance], ctx: &FactorContext) -> FactorScores {
    FactorScores {
        past_results: past_results::score(past, ctx),
        course_fit: course_fit::score(past, ctx),
        time_index: time_index::score(past, ctx),
        last_3f: last_3f::score(past, ctx),
        popularity: popularity::score(past, ctx),
        pedigree: pedigree::score(past, ctx),
        running_style: running_style::score(past, ctx),
    }
}

/// Clamp a raw score into the factor range.
pub(crate) fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}
