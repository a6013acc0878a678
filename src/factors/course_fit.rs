//! Course-fit factor: top-3 rate under matching surface and distance.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

/// Distance tolerance around the target, in meters.
const DISTANCE_TOLERANCE: u32 = 100;

/// Minimum matching runs before the rate is meaningful.
const MIN_MATCHING: usize = 3;

/// Top-3 rate x 100 over past runs on the same surface within ±100 m of the
/// target distance. Requires at least three matching runs.
pub fn score(past: &[PastPerformance], ctx: &FactorContext) -> Option<f64> {
    let surface = ctx.surface?;
    let distance = ctx.distance?;

    let matching: Vec<&PastPerformance> = past
        .iter()
        .filter(|r| {
            !r.is_dnf()
                && r.surface == surface
                && r.distance.abs_diff(distance) <= DISTANCE_TOLERANCE
        })
        .collect();

    if matching.len() < MIN_MATCHING {
        return None;
    }

    let top3 = matching.iter().filter(|r| r.finish_position <= 3).count();
    Some(clamp_score(top3 as f64 / matching.len() as f64 * 100.0))
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

    #[test]
    fn test_top3_rate() {
        // positions 1, 2, 8 on matching course -> 2/3
        let past = vec![perf(10, 1, 10), perf(20, 2, 10), perf(30, 8, 10)];
        let s = score(&past, &ctx()).unwrap();
        assert!((s - 66.666_666_666_666_67).abs() < 1e-9);
    }

    #[test]
    fn test_requires_three_matching_runs() {
        let past = vec![perf(10, 1, 10), perf(20, 1, 10)];
        assert_eq!(score(&past, &ctx()), None);
    }

    #[test]
    fn test_distance_tolerance_is_100m() {
        let mut near = perf(10, 1, 10);
        near.distance = 2100;
        let mut far = perf(20, 1, 10);
        far.distance = 2101;
        let past = vec![near.clone(), near.clone(), far, near];
        // the 2101 m run is outside tolerance; three matching runs remain
        assert_eq!(score(&past, &ctx()), Some(100.0));
    }

    #[test]
    fn test_surface_mismatch_excluded() {
        let mut dirt = perf(10, 1, 10);
        dirt.surface = Surface::Dirt;
        let past = vec![dirt.clone(), dirt.clone(), dirt];
        assert_eq!(score(&past, &ctx()), None);
    }

    #[test]
    fn test_missing_without_target_context() {
        let past = vec![perf(10, 1, 10), perf(20, 1, 10), perf(30, 1, 10)];
        let no_ctx = FactorContext::default();
        assert_eq!(score(&past, &no_ctx), None);
    }
}
