//! Closing-speed factor: best last-three-furlong time of the recent runs.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

/// Linear scale anchors: 33.0 s maps to 100, 38.0 s maps to 0.
const BEST_ANCHOR: f64 = 33.0;
const WORST_ANCHOR: f64 = 38.0;

/// How many recent runs are inspected.
const RECENT_RUNS: usize = 5;

/// Best (lowest) last-3F time across the last five runs, mapped linearly to
/// [0, 100]. Returns `None` with no observation.
pub fn score(past: &[PastPerformance], _ctx: &FactorContext) -> Option<f64> {
    let best = past
        .iter()
        .take(RECENT_RUNS)
        .filter_map(|r| r.last_3f)
        .fold(f64::INFINITY, f64::min);

    if best.is_finite() {
        Some(clamp_score(
            (WORST_ANCHOR - best) / (WORST_ANCHOR - BEST_ANCHOR) * 100.0,
        ))
    } else {
        None
    }
}
