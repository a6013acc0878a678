//! Pedigree factor: sire-line aptitude for the target distance and going.

use crate::factors::{clamp_score, FactorContext};
use crate::pedigree::{line_aptitude, sire_line, DistanceBand, SireLine};
use crate::types::{PastPerformance, TrackType};

/// Sire vs dam-sire blend weights.
const SIRE_WEIGHT: f64 = 0.7;
const DAM_SIRE_WEIGHT: f64 = 0.3;

/// Blend sire and dam-sire line aptitudes over the distance and track
/// dimensions and scale to [0, 100]. Missing without a sire or a target
/// distance. A missing dam-sire falls back to the `Other` line.
pub fn score(_past: &[PastPerformance], ctx: &FactorContext) -> Option<f64> {
    let sire = ctx.sire.as_deref()?;
    let distance = ctx.distance?;

    let sire_apt = line_aptitude(sire_line(sire));
    let dam_line = ctx
        .dam_sire
        .as_deref()
        .map(sire_line)
        .unwrap_or(SireLine::Other);
    let dam_apt = line_aptitude(dam_line);

    let band = DistanceBand::from_distance(distance);
    let track = TrackType::from(ctx.track_condition);

    let distance_score =
        SIRE_WEIGHT * sire_apt.distance(band) + DAM_SIRE_WEIGHT * dam_apt.distance(band);
    let track_score = SIRE_WEIGHT * sire_apt.track(track) + DAM_SIRE_WEIGHT * dam_apt.track(track);

    let combined = (distance_score + track_score) / 2.0;
    Some(clamp_score(combined * 100.0))
}
