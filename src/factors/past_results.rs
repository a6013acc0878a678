//! Recent-form factor: weighted relative finish over the last five runs.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

/// Recency weights, most recent run first.
const WEIGHTS: [f64; 5] = [0.35, 0.25, 0.20, 0.12, 0.08];

/// Weighted average of relative finish position over the last five non-DNF
/// runs. Relative position = (field - position + 1) / field, scaled to
/// [0, 100]. Returns `None` with no valid past run.
pub fn score(past: &[PastPerformance], _ctx: &FactorContext) -> Option<f64> {
    let mut total = 0.0;
    let mut weight_sum = 0.0;

    for (i, run) in past
        .iter()
        .filter(|r| !r.is_dnf() && r.field_size > 0)
        .take(WEIGHTS.len())
        .enumerate()
    {
        let relative =
            (run.field_size - run.finish_position + 1) as f64 / run.field_size as f64 * 100.0;
        total += relative * WEIGHTS[i];
        weight_sum += WEIGHTS[i];
    }

    if weight_sum > 0.0 {
        Some(clamp_score(total / weight_sum))
    } else {
        None
    }
}
