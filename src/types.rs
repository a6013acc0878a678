//! Domain types shared across the prediction core.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::venue_name;
use crate::error::KeibaError;

/// Track surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Turf,
    Dirt,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Turf => "turf",
            Surface::Dirt => "dirt",
        }
    }

    pub fn from_db(value: &str) -> Option<Surface> {
        match value {
            "turf" => Some(Surface::Turf),
            "dirt" => Some(Surface::Dirt),
            _ => None,
        }
    }
}

/// Going reported for the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCondition {
    Good,
    SlightlyHeavy,
    Heavy,
    Bad,
    Unknown,
}

impl Default for TrackCondition {
    fn default() -> Self {
        TrackCondition::Unknown
    }
}

impl TrackCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackCondition::Good => "good",
            TrackCondition::SlightlyHeavy => "slightly_heavy",
            TrackCondition::Heavy => "heavy",
            TrackCondition::Bad => "bad",
            TrackCondition::Unknown => "unknown",
        }
    }

    pub fn from_db(value: &str) -> TrackCondition {
        match value {
            "good" => TrackCondition::Good,
            "slightly_heavy" => TrackCondition::SlightlyHeavy,
            "heavy" => TrackCondition::Heavy,
            "bad" => TrackCondition::Bad,
            _ => TrackCondition::Unknown,
        }
    }
}

/// Coarse track type used by pedigree aptitude lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Good,
    Heavy,
}

impl From<TrackCondition> for TrackType {
    fn from(condition: TrackCondition) -> Self {
        match condition {
            TrackCondition::Heavy | TrackCondition::Bad => TrackType::Heavy,
            _ => TrackType::Good,
        }
    }
}

/// Race grade tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    G1,
    G2,
    G3,
    Listed,
    Open,
    Conditional,
    Unknown,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::G1 => "G1",
            Grade::G2 => "G2",
            Grade::G3 => "G3",
            Grade::Listed => "L",
            Grade::Open => "OP",
            Grade::Conditional => "conditional",
            Grade::Unknown => "unknown",
        }
    }

    pub fn from_db(value: &str) -> Grade {
        match value {
            "G1" => Grade::G1,
            "G2" => Grade::G2,
            "G3" => Grade::G3,
            "L" => Grade::Listed,
            "OP" => Grade::Open,
            "conditional" => Grade::Conditional,
            _ => Grade::Unknown,
        }
    }
}

/// Validated 12-character composite race identifier (YYYYVVMMDDRR: year,
/// venue code, meeting round, day of meeting, race number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(String);

impl RaceId {
    /// Parse and validate a race id. The venue code must be a JRA code
    /// (01-10).
    pub fn parse(value: &str) -> Result<RaceId, KeibaError> {
        if value.len() != 12 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeibaError::InvalidRaceId(value.to_string()));
        }
        if venue_name(&value[4..6]).is_none() {
            return Err(KeibaError::InvalidRaceId(value.to_string()));
        }
        Ok(RaceId(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year(&self) -> i32 {
        self.0[0..4].parse().unwrap_or(0)
    }

    pub fn venue_code(&self) -> &str {
        &self.0[4..6]
    }

    pub fn race_number(&self) -> u32 {
        self.0[10..12].parse().unwrap_or(0)
    }
}

impl std::fmt::Display for RaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A race as stored in the database.
#[derive(Debug, Clone)]
pub struct Race {
    pub id: String,
    pub date: NaiveDate,
    pub venue: String,
    pub race_number: u32,
    pub name: String,
    pub distance: u32,
    pub surface: Surface,
    pub track_condition: TrackCondition,
    pub grade: Grade,
    pub weather: Option<String>,
}

/// A horse master row. Sire and dam-sire may be missing; downstream factors
/// degrade gracefully.
#[derive(Debug, Clone)]
pub struct Horse {
    pub id: String,
    pub name: String,
    pub sex: Option<String>,
    pub birth_year: Option<i32>,
    pub sire: Option<String>,
    pub dam_sire: Option<String>,
}

/// One horse's result row in one race. `finish_position` 0 means the horse
/// did not finish.
#[derive(Debug, Clone)]
pub struct RaceResult {
    pub race_id: String,
    pub horse_id: String,
    pub finish_position: u32,
    pub bracket_number: u32,
    pub horse_number: u32,
    pub odds: Option<f64>,
    pub popularity: Option<u32>,
    pub weight: Option<u32>,
    pub weight_diff: Option<i32>,
    pub finish_time: Option<f64>,
    pub margin: Option<String>,
    pub last_3f: Option<f64>,
    pub sex: Option<String>,
    pub age: Option<u32>,
    pub impost: Option<f64>,
    pub passing_order: Option<String>,
    pub jockey_id: Option<String>,
    pub jockey_name: Option<String>,
}

impl RaceResult {
    pub fn is_dnf(&self) -> bool {
        self.finish_position == 0
    }
}

/// A single prior race of a horse as returned by the past-results query.
/// Ordered most recent first by the repository contract.
#[derive(Debug, Clone)]
pub struct PastPerformance {
    pub race_id: String,
    pub race_date: NaiveDate,
    pub venue: String,
    pub surface: Surface,
    pub distance: u32,
    pub track_condition: TrackCondition,
    pub finish_position: u32,
    pub field_size: u32,
    pub finish_time: Option<f64>,
    pub last_3f: Option<f64>,
    pub odds: Option<f64>,
    pub popularity: Option<u32>,
    pub passing_order: Option<String>,
}

impl PastPerformance {
    pub fn is_dnf(&self) -> bool {
        self.finish_position == 0
    }
}

/// One entry in a race card. Pre-race fields only; odds, popularity and body
/// weight are the morning market/paddock data when available.
#[derive(Debug, Clone)]
pub struct RaceEntry {
    pub horse_id: String,
    pub horse_name: String,
    pub horse_number: u32,
    pub bracket_number: u32,
    pub jockey_id: String,
    pub jockey_name: String,
    pub impost: f64,
    pub sex: Option<String>,
    pub age: Option<u32>,
    pub odds: Option<f64>,
    pub popularity: Option<u32>,
    pub weight: Option<u32>,
    pub weight_diff: Option<i32>,
}

/// The full race card handed to the prediction service.
#[derive(Debug, Clone)]
pub struct ShutubaData {
    pub race_id: String,
    pub race_name: String,
    pub race_number: u32,
    pub venue: String,
    pub distance: u32,
    pub surface: Surface,
    pub track_condition: TrackCondition,
    pub date: NaiveDate,
    pub entries: Vec<RaceEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_id_parse_valid() {
        let id = RaceId::parse("202606010801").unwrap();
        assert_eq!(id.year(), 2026);
        assert_eq!(id.venue_code(), "06");
        assert_eq!(id.race_number(), 1);
    }

    #[test]
    fn test_race_id_rejects_bad_length() {
        assert!(RaceId::parse("2026060108").is_err());
        assert!(RaceId::parse("20260601080112").is_err());
    }

    #[test]
    fn test_race_id_rejects_non_digits() {
        assert!(RaceId::parse("2026x6010801").is_err());
    }

    #[test]
    fn test_race_id_rejects_unknown_venue() {
        // venue code 11 is not a JRA course
        assert!(RaceId::parse("202611010801").is_err());
        assert!(RaceId::parse("202600010801").is_err());
    }

    #[test]
    fn test_surface_round_trip() {
        assert_eq!(Surface::from_db("turf"), Some(Surface::Turf));
        assert_eq!(Surface::from_db(Surface::Dirt.as_str()), Some(Surface::Dirt));
        assert_eq!(Surface::from_db("sand"), None);
    }

    #[test]
    fn test_track_condition_defaults_to_unknown() {
        assert_eq!(TrackCondition::from_db("muddy"), TrackCondition::Unknown);
        assert_eq!(
            TrackCondition::from_db("slightly_heavy"),
            TrackCondition::SlightlyHeavy
        );
    }

    #[test]
    fn test_track_type_mapping() {
        assert_eq!(TrackType::from(TrackCondition::Good), TrackType::Good);
        assert_eq!(
            TrackType::from(TrackCondition::SlightlyHeavy),
            TrackType::Good
        );
        assert_eq!(TrackType::from(TrackCondition::Heavy), TrackType::Heavy);
        assert_eq!(TrackType::from(TrackCondition::Bad), TrackType::Heavy);
        assert_eq!(TrackType::from(TrackCondition::Unknown), TrackType::Good);
    }
}
