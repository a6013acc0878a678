//! Tabular rendering of backtest results.

use super::metrics::{BacktestMetrics, RaceBacktestResult};

const RULE_WIDTH: usize = 72;

/// Renders backtest summaries and per-race detail blocks.
pub struct BacktestReporter {
    start_date: String,
    end_date: String,
    retrain_interval: String,
}

impl BacktestReporter {
    pub fn new(start_date: &str, end_date: &str, retrain_interval: &str) -> Self {
        BacktestReporter {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            retrain_interval: retrain_interval.to_string(),
        }
    }

    /// Fixed-column summary table comparing ML and factor predictions.
    pub fn summary(&self, results: &[RaceBacktestResult], metrics: &BacktestMetrics) -> String {
        let race_count = results.len();
        let horse_count: usize = results.iter().map(|r| r.predictions.len()).sum();

        let mut lines = vec![
            "=".repeat(RULE_WIDTH),
            format!("Backtest results: {} .. {}", self.start_date, self.end_date),
            "=".repeat(RULE_WIDTH),
            format!("Races evaluated:  {race_count}"),
            format!("Runners scored:   {horse_count}"),
            format!("Retrain interval: {}", self.retrain_interval),
            String::new(),
            "-".repeat(RULE_WIDTH),
            format!("{:<22}|{:>11} |{:>11} |{:>8}", "", "ML", "Factor", "Diff"),
            "-".repeat(RULE_WIDTH),
        ];

        let rows: [(&str, f64, f64); 5] = [
            ("Precision@1", metrics.ml.precision_at_1, metrics.factor.precision_at_1),
            ("Precision@3", metrics.ml.precision_at_3, metrics.factor.precision_at_3),
            ("Hit rate rank-1", metrics.ml.hit_rate_rank_1, metrics.factor.hit_rate_rank_1),
            ("Hit rate rank-2", metrics.ml.hit_rate_rank_2, metrics.factor.hit_rate_rank_2),
            ("Hit rate rank-3", metrics.ml.hit_rate_rank_3, metrics.factor.hit_rate_rank_3),
        ];
        for (label, ml, factor) in rows {
            lines.push(format!(
                "{:<22}|{:>11} |{:>11} |{:>8}",
                label,
                fmt_pct(ml),
                fmt_pct(factor),
                fmt_diff(ml, factor),
            ));
        }
        lines.push("-".repeat(RULE_WIDTH));

        lines.join("\n")
    }

    /// Detail block for one race: header plus the top-k ML picks.
    pub fn race_detail(&self, result: &RaceBacktestResult, top_k: usize) -> String {
        let mut lines = vec![
            format!("{} {} {}", result.race_date, result.venue, result.race_name),
            format!(
                "{:>4} | {:<16} | {:>7} | {:>5} | {:>5} | {:>5} | {:^4}",
                "No.", "Horse", "ML", "ML-R", "FS-R", "Pos", "Hit"
            ),
            "-".repeat(70),
        ];

        let mut picks: Vec<_> = result
            .predictions
            .iter()
            .filter(|p| p.ml_rank.is_some())
            .collect();
        picks.sort_by_key(|p| p.ml_rank);

        for pick in picks.iter().take(top_k) {
            let hit = if pick.actual_rank <= 3 { "HIT" } else { "" };
            let prob = match pick.ml_probability {
                Some(p) => format!("{:.1}%", p * 100.0),
                None => "-".to_string(),
            };
            let ml_rank = match pick.ml_rank {
                Some(r) => r.to_string(),
                None => "-".to_string(),
            };
            let actual = if pick.actual_rank >= 99 {
                "-".to_string()
            } else {
                pick.actual_rank.to_string()
            };
            lines.push(format!(
                "{:>4} | {:<16} | {:>7} | {:>5} | {:>5} | {:>5} | {:^4}",
                pick.horse_number, pick.horse_name, prob, ml_rank, pick.factor_rank, actual, hit
            ));
        }

        lines.join("\n")
    }
}

fn fmt_pct(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{:.1}%", value * 100.0)
    }
}

fn fmt_diff(ml: f64, factor: f64) -> String {
    if ml.is_nan() || factor.is_nan() {
        return "-".to_string();
    }
    let diff = (ml - factor) * 100.0;
    if diff >= 0.0 {
        format!("+{diff:.1}%")
    } else {
        format!("{diff:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::metrics::{BacktestPrediction, MetricSet};
    use chrono::NaiveDate;

    fn sample_result() -> RaceBacktestResult {
        RaceBacktestResult {
            race_id: "202605021105".to_string(),
            race_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
            race_name: "テストステークス".to_string(),
            venue: "東京".to_string(),
            predictions: vec![
                BacktestPrediction {
                    horse_number: 5,
                    horse_name: "アルファ".to_string(),
                    ml_probability: Some(0.42),
                    ml_rank: Some(1),
                    factor_rank: 2,
                    actual_rank: 1,
                },
                BacktestPrediction {
                    horse_number: 3,
                    horse_name: "ベータ".to_string(),
                    ml_probability: Some(0.31),
                    ml_rank: Some(2),
                    factor_rank: 1,
                    actual_rank: 99,
                },
            ],
        }
    }

    #[test]
    fn test_summary_contains_all_metric_rows() {
        let reporter = BacktestReporter::new("2025-10-01", "2025-12-31", "weekly");
        let metrics = BacktestMetrics {
            ml: MetricSet {
                precision_at_1: 0.35,
                precision_at_3: 0.42,
                hit_rate_rank_1: 0.35,
                hit_rate_rank_2: 0.30,
                hit_rate_rank_3: 0.25,
            },
            factor: MetricSet {
                precision_at_1: 0.30,
                precision_at_3: 0.40,
                hit_rate_rank_1: 0.30,
                hit_rate_rank_2: 0.28,
                hit_rate_rank_3: 0.26,
            },
        };

        let text = reporter.summary(&[sample_result()], &metrics);
        assert!(text.contains("Precision@1"));
        assert!(text.contains("Precision@3"));
        assert!(text.contains("Hit rate rank-3"));
        assert!(text.contains("35.0%"));
        assert!(text.contains("+5.0%"));
        assert!(text.contains("weekly"));
        assert!(text.contains("Races evaluated:  1"));
    }

    #[test]
    fn test_summary_columns_are_stable() {
        let reporter = BacktestReporter::new("2025-10-01", "2025-12-31", "weekly");
        let text = reporter.summary(&[], &BacktestMetrics::default());
        let metric_lines: Vec<&str> = text
            .lines()
            .filter(|l| l.contains('|') && !l.contains("ML"))
            .collect();
        assert_eq!(metric_lines.len(), 5);
        let widths: Vec<usize> = metric_lines.iter().map(|l| l.len()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_nan_renders_as_dash() {
        assert_eq!(fmt_pct(f64::NAN), "-");
        assert_eq!(fmt_diff(f64::NAN, 0.5), "-");
    }

    #[test]
    fn test_race_detail_marks_hits_and_unknown_positions() {
        let reporter = BacktestReporter::new("2025-10-01", "2025-12-31", "weekly");
        let text = reporter.race_detail(&sample_result(), 3);
        assert!(text.contains("HIT"));
        assert!(text.contains("42.0%"));
        // unknown actual rank renders as "-"
        let beta_line = text.lines().find(|l| l.contains("ベータ")).unwrap();
        assert!(beta_line.contains(" - "));
    }
}
