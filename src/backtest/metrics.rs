//! Race-grouped evaluation metrics for backtest output.

use chrono::NaiveDate;

/// One horse's prediction in a backtested race.
#[derive(Debug, Clone)]
pub struct BacktestPrediction {
    pub horse_number: u32,
    pub horse_name: String,
    /// Absent while the engine runs degraded (factor-only).
    pub ml_probability: Option<f64>,
    pub ml_rank: Option<u32>,
    pub factor_rank: u32,
    /// 99 when unknown or the horse did not finish. Sorting only.
    pub actual_rank: u32,
}

/// One backtested race.
#[derive(Debug, Clone)]
pub struct RaceBacktestResult {
    pub race_id: String,
    pub race_date: NaiveDate,
    pub race_name: String,
    pub venue: String,
    pub predictions: Vec<BacktestPrediction>,
}

/// Metrics of one prediction variant (ML or factor).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSet {
    pub precision_at_1: f64,
    pub precision_at_3: f64,
    pub hit_rate_rank_1: f64,
    pub hit_rate_rank_2: f64,
    pub hit_rate_rank_3: f64,
}

/// ML-driven and factor-driven metrics side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BacktestMetrics {
    pub ml: MetricSet,
    pub factor: MetricSet,
}

/// Computes race-grouped metrics over backtest results.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Precision@1: share of races whose top-1 pick finished in the top 3.
    pub fn precision_at_1(results: &[RaceBacktestResult], use_ml: bool) -> f64 {
        let mut races = 0usize;
        let mut hits = 0usize;

        for race in results {
            let Some(top) = ranked(&race.predictions, use_ml, 1) else {
                continue;
            };
            races += 1;
            if top.actual_rank <= 3 {
                hits += 1;
            }
        }
        ratio(hits as f64, races as f64)
    }

    /// Precision@3: mean over races of |top-3 picks ∩ actual top-3| / 3.
    pub fn precision_at_3(results: &[RaceBacktestResult], use_ml: bool) -> f64 {
        let mut races = 0usize;
        let mut total = 0.0;

        for race in results {
            let picks: Vec<&BacktestPrediction> = (1..=3)
                .filter_map(|rank| ranked(&race.predictions, use_ml, rank))
                .collect();
            if picks.is_empty() {
                continue;
            }
            races += 1;
            let overlap = picks.iter().filter(|p| p.actual_rank <= 3).count();
            total += overlap as f64 / 3.0;
        }
        ratio(total, races as f64)
    }

    /// Share of races whose rank-k pick finished in the top 3.
    pub fn hit_rate_by_rank(results: &[RaceBacktestResult], rank: u32, use_ml: bool) -> f64 {
        let mut races = 0usize;
        let mut hits = 0usize;

        for race in results {
            let Some(pick) = ranked(&race.predictions, use_ml, rank) else {
                continue;
            };
            races += 1;
            if pick.actual_rank <= 3 {
                hits += 1;
            }
        }
        ratio(hits as f64, races as f64)
    }

    /// All metrics for both prediction variants.
    pub fn calculate(results: &[RaceBacktestResult]) -> BacktestMetrics {
        let set = |use_ml: bool| MetricSet {
            precision_at_1: Self::precision_at_1(results, use_ml),
            precision_at_3: Self::precision_at_3(results, use_ml),
            hit_rate_rank_1: Self::hit_rate_by_rank(results, 1, use_ml),
            hit_rate_rank_2: Self::hit_rate_by_rank(results, 2, use_ml),
            hit_rate_rank_3: Self::hit_rate_by_rank(results, 3, use_ml),
        };
        BacktestMetrics {
            ml: set(true),
            factor: set(false),
        }
    }
}

fn ranked(
    predictions: &[BacktestPrediction],
    use_ml: bool,
    rank: u32,
) -> Option<&BacktestPrediction> {
    predictions.iter().find(|p| {
        if use_ml {
            p.ml_rank == Some(rank)
        } else {
            p.factor_rank == rank
        }
    })
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
