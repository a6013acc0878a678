//! Market factor: score from the target race's own odds or popularity rank.
//!
//! This is the one factor that reads current-race context only; prior-race
//! market data never enters it.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

/// With odds O: 100 - min(50, 10 * log10(O)). Without odds, fall back to the
/// popularity rank: (field - rank + 1) / field * 100. `None` when neither is
/// present.
pub fn score(_past: &[PastPerformance], ctx: &FactorContext) -> Option<f64> {
    if let Some(odds) = ctx.odds {
        if odds > 0.0 {
            let penalty = (10.0 * odds.log10()).min(50.0);
            return Some(clamp_score(100.0 - penalty));
        }
    }

    if let (Some(rank), true) = (ctx.popularity, ctx.field_size > 0) {
        if rank >= 1 && rank <= ctx.field_size {
            let relative = (ctx.field_size - rank + 1) as f64 / ctx.field_size as f64;
            return Some(clamp_score(relative * 100.0));
        }
    }

    None
}
