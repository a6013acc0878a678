//! Time-index factor: finish times against a distance-matched baseline.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

const DISTANCE_TOLERANCE: u32 = 100;
const MIN_MATCHING: usize = 2;

/// Compare the horse's finish times on matching surface/distance against the
/// median of that filtered set: score = 50 + 5 x z-score, where z measures
/// how far below the baseline the horse's mean time sits (faster is
/// positive). Requires at least two timed matching runs.
pub fn score(past: &[PastPerformance], ctx: &FactorContext) -> Option<f64> {
    let surface = ctx.surface?;
    let distance = ctx.distance?;

    let mut times: Vec<f64> = past
        .iter()
        .filter(|r| {
            r.surface == surface && r.distance.abs_diff(distance) <= DISTANCE_TOLERANCE
        })
        .filter_map(|r| r.finish_time)
        .collect();

    if times.len() < MIN_MATCHING {
        return None;
    }

    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let baseline = median(&mut times);
    let variance =
        times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / times.len() as f64;
    let std_dev = variance.sqrt();

    let z = if std_dev > f64::EPSILON {
        (baseline - mean) / std_dev
    } else {
        0.0
    };

    Some(clamp_score(50.0 + 5.0 * z))
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::tests::perf;
    use crate::types::Surface;

    fn ctx() -> FactorContext {
        FactorContext {
            surface: Some(Surface::Turf),
            distance: Some(2000),
            ..FactorContext::default()
        }
    }

    fn timed(days_ago: u32, secs: f64) -> crate::types::PastPerformance {
        let mut p = perf(days_ago, 3, 10);
        p.finish_time = Some(secs);
        p
    }

    #[test]
    fn test_symmetric_times_score_midpoint() {
        // median equals mean -> z = 0 -> 50
        let past = vec![timed(10, 119.0), timed(20, 120.0), timed(30, 121.0)];
        let s = score(&past, &ctx()).unwrap();
        assert!((s - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_slow_outlier_lowers_score() {
        // one very slow run drags the mean above the median baseline, so the
        // horse's typical time reads as slower than its baseline
        let past = vec![timed(10, 118.0), timed(20, 119.0), timed(30, 135.0)];
        let s = score(&past, &ctx()).unwrap();
        assert!(s < 50.0);
    }

    #[test]
    fn test_fast_outlier_raises_score() {
        let past = vec![timed(10, 121.0), timed(20, 120.0), timed(30, 105.0)];
        let s = score(&past, &ctx()).unwrap();
        assert!(s > 50.0);
    }

    #[test]
    fn test_requires_two_timed_runs() {
        let past = vec![timed(10, 120.0)];
        assert_eq!(score(&past, &ctx()), None);

        // untimed runs do not count toward the minimum
        let past = vec![timed(10, 120.0), perf(20, 3, 10)];
        assert_eq!(score(&past, &ctx()), None);
    }

    #[test]
    fn test_identical_times_score_midpoint() {
        let past = vec![timed(10, 120.0), timed(20, 120.0)];
        assert_eq!(score(&past, &ctx()), Some(50.0));
    }

    #[test]
    fn test_distance_filter_applies() {
        let mut far = timed(10, 90.0);
        far.distance = 1600;
        let past = vec![far, timed(20, 120.0), timed(30, 120.0)];
        // the 1600 m run must not enter the 2000 m baseline
        assert_eq!(score(&past, &ctx()), Some(50.0));
    }
}
