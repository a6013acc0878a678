//! Shared constants for the prediction core.

/// JRA (central) racecourse codes as they appear in positions 5-6 of a race id.
pub const JRA_VENUES: [(&str, &str); 10] = [
    ("01", "札幌"),
    ("02", "函館"),
    ("03", "福島"),
    ("04", "新潟"),
    ("05", "東京"),
    ("06", "中山"),
    ("07", "中京"),
    ("08", "京都"),
    ("09", "阪神"),
    ("10", "小倉"),
];

/// Resolve a two-digit venue code to its racecourse name.
pub fn venue_name(code: &str) -> Option<&'static str> {
    JRA_VENUES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Minimum number of samples required to train a model.
pub const MIN_TRAINING_SAMPLES: usize = 100;

/// Maximum past results fetched per horse.
pub const MAX_PAST_RESULTS_PER_HORSE: usize = 20;

/// Finish position used when the actual rank is unknown or the horse did not
/// finish. Sorting only; must never reach labels or features.
pub const DEFAULT_FINISH_POSITION: u32 = 99;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_name_lookup() {
        assert_eq!(venue_name("05"), Some("東京"));
        assert_eq!(venue_name("10"), Some("小倉"));
        assert_eq!(venue_name("11"), None);
        assert_eq!(venue_name("00"), None);
    }
}
