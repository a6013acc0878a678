//! Weighted aggregation of factor scores.

use anyhow::{bail, Result};

use crate::factors::FactorScores;

/// Tolerance on the weight-sum invariant.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Fixed weights over the seven factors. Must sum to 1.0 (±0.001).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorWeights {
    pub past_results: f64,
    pub course_fit: f64,
    pub time_index: f64,
    pub last_3f: f64,
    pub popularity: f64,
    pub pedigree: f64,
    pub running_style: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        FactorWeights {
            past_results: 0.25,
            time_index: 0.18,
            last_3f: 0.14,
            course_fit: 0.12,
            popularity: 0.12,
            pedigree: 0.10,
            running_style: 0.09,
        }
    }
}

impl FactorWeights {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "past_results" => Some(self.past_results),
            "course_fit" => Some(self.course_fit),
            "time_index" => Some(self.time_index),
            "last_3f" => Some(self.last_3f),
            "popularity" => Some(self.popularity),
            "pedigree" => Some(self.pedigree),
            "running_style" => Some(self.running_style),
            _ => None,
        }
    }

    pub fn sum(&self) -> f64 {
        self.past_results
            + self.course_fit
            + self.time_index
            + self.last_3f
            + self.popularity
            + self.pedigree
            + self.running_style
    }

    /// Check the weight-sum invariant.
    pub fn validate(&self) -> Result<()> {
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("factor weights sum to {sum}, expected 1.0");
        }
        Ok(())
    }

    /// Weighted total over the factors that produced a score, re-normalized
    /// by the weight mass of those factors. `None` when every factor is
    /// missing.
    pub fn weighted_total(&self, scores: &FactorScores) -> Option<f64> {
        let mut total = 0.0;
        let mut weight_sum = 0.0;

        for (name, score) in scores.iter() {
            if let (Some(score), Some(weight)) = (score, self.get(name)) {
                total += score * weight;
                weight_sum += weight;
            }
        }

        if weight_sum > 0.0 {
            Some(total / weight_sum)
        } else {
            None
        }
    }
}
