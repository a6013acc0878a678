//! Running-style factor: match a horse's style tendency against the course's
//! style win rates.

use crate::factors::{clamp_score, FactorContext};
use crate::types::PastPerformance;

/// Running style classified from the first-corner position ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStyle {
    Escape,
    Front,
    Stalker,
    Closer,
}

/// Style win rates for a course. Venue+distance specific tables can be fed
/// through the factor context; otherwise the JRA-wide defaults apply.
#[derive(Debug, Clone, Copy)]
pub struct StyleRates {
    pub escape: f64,
    pub front: f64,
    pub stalker: f64,
    pub closer: f64,
}

impl StyleRates {
    pub fn rate(&self, style: RunningStyle) -> f64 {
        match style {
            RunningStyle::Escape => self.escape,
            RunningStyle::Front => self.front,
            RunningStyle::Stalker => self.stalker,
            RunningStyle::Closer => self.closer,
        }
    }
}

impl Default for StyleRates {
    fn default() -> Self {
        StyleRates {
            escape: 0.15,
            front: 0.35,
            stalker: 0.35,
            closer: 0.15,
        }
    }
}

/// How many recent runs feed the tendency.
const RECENT_RUNS: usize = 5;

/// Classify a run from its passing order and field size. The first corner
/// position drives the call; boundary ratios 0.15 / 0.40 / 0.70 belong to
/// the faster class.
pub fn classify(passing_order: &str, field_size: u32) -> Option<RunningStyle> {
    if field_size == 0 {
        return None;
    }
    let first_corner: u32 = passing_order.split('-').next()?.trim().parse().ok()?;
    if first_corner == 0 {
        return None;
    }

    let ratio = first_corner as f64 / field_size as f64;
    Some(if ratio <= 0.15 {
        RunningStyle::Escape
    } else if ratio <= 0.40 {
        RunningStyle::Front
    } else if ratio <= 0.70 {
        RunningStyle::Stalker
    } else {
        RunningStyle::Closer
    })
}

/// Mode of the classified styles over the last five runs. Ties resolve to the
/// style seen in the more recent run.
fn tendency(past: &[PastPerformance]) -> Option<RunningStyle> {
    let styles: Vec<RunningStyle> = past
        .iter()
        .filter(|r| r.passing_order.is_some() && r.field_size > 0)
        .take(RECENT_RUNS)
        .filter_map(|r| classify(r.passing_order.as_deref()?, r.field_size))
        .collect();

    if styles.is_empty() {
        return None;
    }

    let all = [
        RunningStyle::Escape,
        RunningStyle::Front,
        RunningStyle::Stalker,
        RunningStyle::Closer,
    ];
    all.into_iter()
        .filter_map(|style| {
            let count = styles.iter().filter(|s| **s == style).count();
            let first_seen = styles.iter().position(|s| *s == style)?;
            Some((style, count, first_seen))
        })
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map(|(style, _, _)| style)
}

/// Score the horse's style tendency against the course's win-rate table:
/// (win_rate - 0.05) / 0.35 * 100, clamped. Missing without a classifiable
/// past run.
pub fn score(past: &[PastPerformance], ctx: &FactorContext) -> Option<f64> {
    let style = tendency(past)?;
    let rates = ctx.style_rates.unwrap_or_default();
    let win_rate = rates.rate(style);
    Some(clamp_score((win_rate - 0.05) / 0.35 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::tests::perf;

    fn with_order(days_ago: u32, order: &str, field: u32) -> PastPerformance {
        let mut p = perf(days_ago, 3, field);
        p.passing_order = Some(order.to_string());
        p
    }

    #[test]
    fn test_classify_boundary_ratios() {
        // 20-horse field: 3/20 = 0.15 exactly -> escape
        assert_eq!(classify("3-3-2-1", 20), Some(RunningStyle::Escape));
        // 8/20 = 0.40 exactly -> front
        assert_eq!(classify("8-7-5-4", 20), Some(RunningStyle::Front));
        // 14/20 = 0.70 exactly -> stalker
        assert_eq!(classify("14-12-9-6", 20), Some(RunningStyle::Stalker));
        // 15/20 = 0.75 -> closer
        assert_eq!(classify("15-14-10-5", 20), Some(RunningStyle::Closer));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert_eq!(classify("", 10), None);
        assert_eq!(classify("x-1-1", 10), None);
        assert_eq!(classify("1-1-1", 0), None);
    }

    #[test]
    fn test_tendency_is_mode_of_recent_runs() {
        let past = vec![
            with_order(10, "1-1-1-1", 10),
            with_order(20, "8-8-7-5", 10),
            with_order(30, "1-1-2-1", 10),
        ];
        assert_eq!(tendency(&past), Some(RunningStyle::Escape));
    }

    #[test]
    fn test_tendency_tie_prefers_recent_style() {
        let past = vec![
            with_order(10, "8-8-7-5", 10), // closer (0.8)
            with_order(20, "1-1-1-1", 10), // escape
        ];
        assert_eq!(tendency(&past), Some(RunningStyle::Closer));
    }

    #[test]
    fn test_default_rates_scoring() {
        // front default 0.35 -> (0.35 - 0.05) / 0.35 * 100 ≈ 85.71
        let past = vec![with_order(10, "3-3-3-3", 10)];
        let s = score(&past, &FactorContext::default()).unwrap();
        assert!((s - 85.714_285_714_285_71).abs() < 1e-9);

        // escape default 0.15 -> ≈ 28.57
        let past = vec![with_order(10, "1-1-1-1", 10)];
        let s = score(&past, &FactorContext::default()).unwrap();
        assert!((s - 28.571_428_571_428_573).abs() < 1e-9);
    }

    #[test]
    fn test_course_specific_rates_override_defaults() {
        let ctx = FactorContext {
            style_rates: Some(StyleRates {
                escape: 0.40,
                front: 0.30,
                stalker: 0.20,
                closer: 0.10,
            }),
            ..FactorContext::default()
        };
        let past = vec![with_order(10, "1-1-1-1", 10)];
        assert_eq!(score(&past, &ctx), Some(100.0));
    }

    #[test]
    fn test_missing_without_classifiable_run() {
        assert_eq!(score(&[], &FactorContext::default()), None);
        assert_eq!(score(&[perf(10, 3, 10)], &FactorContext::default()), None);
    }
}
