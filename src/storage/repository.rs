//! SQLite repository with the read contracts used by prediction, backtest
//! and simulation.
//!
//! Past-results queries are leak-checked: a returned row dated at or after
//! its cutoff is a programmer error and fails fast.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::KeibaError;
use crate::types::{
    Grade, Horse, PastPerformance, Race, RaceResult, Surface, TrackCondition,
};

use super::schema::create_tables;

/// Leak-free access to a horse's prior races. The one capability the
/// prediction service needs; an in-memory double substitutes in tests.
pub trait PastResultsSource {
    /// Prior races strictly before `before`, most recent first, at most
    /// `limit` rows.
    fn past_results(
        &self,
        horse_id: &str,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<PastPerformance>>;
}

/// Batched horse-master lookup for pedigree context.
pub trait HorseSource {
    fn horses_batch(&self, horse_ids: &[String]) -> Result<HashMap<String, Horse>>;
}

/// Repository over the local SQLite store.
pub struct RaceRepository {
    conn: Mutex<Connection>,
}

impl RaceRepository {
    /// Open (and initialize if needed) the database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(db_path).context("Failed to open database")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Ephemeral in-memory repository for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // ==================== Insert Operations ====================

    /// Insert a race (upsert).
    pub fn insert_race(&self, race: &Race) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
            INSERT OR REPLACE INTO races
            (race_id, race_date, venue, race_number, race_name, distance,
             surface, track_condition, grade, weather)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                race.id,
                race.date.to_string(),
                race.venue,
                race.race_number,
                race.name,
                race.distance,
                race.surface.as_str(),
                race.track_condition.as_str(),
                race.grade.as_str(),
                race.weather,
            ],
        )?;
        Ok(())
    }

    /// Insert a horse master row (upsert).
    pub fn insert_horse(&self, horse: &Horse) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
            INSERT OR REPLACE INTO horses
            (horse_id, name, sex, birth_year, sire, dam_sire)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                horse.id,
                horse.name,
                horse.sex,
                horse.birth_year,
                horse.sire,
                horse.dam_sire,
            ],
        )?;
        Ok(())
    }

    /// Insert a race result row (upsert on race + horse number).
    pub fn insert_result(&self, result: &RaceResult) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
            INSERT OR REPLACE INTO race_results
            (race_id, horse_id, finish_position, bracket_number, horse_number,
             odds, popularity, weight, weight_diff, finish_time, margin,
             last_3f, sex, age, impost, passing_order, jockey_id, jockey_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                result.race_id,
                result.horse_id,
                result.finish_position,
                result.bracket_number,
                result.horse_number,
                result.odds,
                result.popularity,
                result.weight,
                result.weight_diff,
                result.finish_time,
                result.margin,
                result.last_3f,
                result.sex,
                result.age,
                result.impost,
                result.passing_order,
                result.jockey_id,
                result.jockey_name,
            ],
        )?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Fetch one race by id.
    pub fn fetch_race(&self, race_id: &str) -> Result<Option<Race>> {
        let race = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                r#"
                SELECT race_id, race_date, venue, race_number, race_name,
                       distance, surface, track_condition, grade, weather
                FROM races WHERE race_id = ?1
                "#,
                [race_id],
                race_from_row,
            )
            .optional()?;
        Ok(race)
    }

    /// All result rows of one race, ordered by horse number.
    pub fn fetch_race_results(&self, race_id: &str) -> Result<Vec<RaceResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT race_id, horse_id, finish_position, bracket_number, horse_number,
                   odds, popularity, weight, weight_diff, finish_time, margin,
                   last_3f, sex, age, impost, passing_order, jockey_id, jockey_name
            FROM race_results
            WHERE race_id = ?1
            ORDER BY horse_number
            "#,
        )?;

        let results = stmt
            .query_map([race_id], result_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Races in the window, ascending by date then race number; optionally
    /// restricted to a venue set.
    pub fn fetch_races_in_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        venues: Option<&[String]>,
    ) -> Result<Vec<Race>> {
        let mut sql = String::from(
            r#"
            SELECT race_id, race_date, venue, race_number, race_name,
                   distance, surface, track_condition, grade, weather
            FROM races
            WHERE race_date >= ?1 AND race_date <= ?2
            "#,
        );

        let mut bind: Vec<String> = vec![from.to_string(), to.to_string()];
        if let Some(venues) = venues {
            let placeholders = vec!["?"; venues.len()].join(", ");
            sql.push_str(&format!(" AND venue IN ({placeholders})"));
            bind.extend(venues.iter().cloned());
        }
        sql.push_str(" ORDER BY race_date, race_number");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let races = stmt
            .query_map(params_from_iter(bind.iter()), race_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(races)
    }

    /// Races strictly before `cutoff`, ascending, for training scans.
    pub fn fetch_races_before(&self, cutoff: NaiveDate) -> Result<Vec<Race>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT race_id, race_date, venue, race_number, race_name,
                   distance, surface, track_condition, grade, weather
            FROM races
            WHERE race_date < ?1
            ORDER BY race_date, race_number
            "#,
        )?;
        let races = stmt
            .query_map([cutoff.to_string()], race_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(races)
    }

    /// Past performances of many horses in ONE round-trip.
    ///
    /// Rows are strictly before `before`, grouped per horse most recent
    /// first, capped at `per_horse_limit`. Every requested horse id is
    /// present in the returned map, possibly with an empty history.
    pub fn fetch_past_results_batch(
        &self,
        horse_ids: &[String],
        before: NaiveDate,
        per_horse_limit: usize,
    ) -> Result<HashMap<String, Vec<PastPerformance>>> {
        let mut grouped: HashMap<String, Vec<PastPerformance>> = horse_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        if horse_ids.is_empty() {
            return Ok(grouped);
        }

        let placeholders = vec!["?"; horse_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT rr.horse_id, rr.race_id, r.race_date, r.venue, r.surface,
                   r.distance, r.track_condition, rr.finish_position,
                   fs.field_size, rr.finish_time, rr.last_3f, rr.odds,
                   rr.popularity, rr.passing_order
            FROM race_results rr
            JOIN races r ON r.race_id = rr.race_id
            JOIN (
                SELECT race_id, COUNT(*) AS field_size
                FROM race_results
                GROUP BY race_id
            ) fs ON fs.race_id = rr.race_id
            WHERE rr.horse_id IN ({placeholders}) AND r.race_date < ?
            ORDER BY rr.horse_id, r.race_date DESC, r.race_number DESC
            "#
        );

        let mut bind: Vec<String> = horse_ids.to_vec();
        bind.push(before.to_string());

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
            let horse_id: String = row.get(0)?;
            Ok((horse_id, past_performance_from_row(row)?))
        })?;

        for row in rows {
            let (horse_id, perf) = row?;
            if perf.race_date >= before {
                return Err(KeibaError::DataLeak {
                    row_date: perf.race_date,
                    cutoff: before,
                }
                .into());
            }
            if let Some(history) = grouped.get_mut(&horse_id) {
                if history.len() < per_horse_limit {
                    history.push(perf);
                }
            }
        }

        Ok(grouped)
    }

    /// Horse master rows for many horses in ONE round-trip.
    pub fn fetch_horses_batch(&self, horse_ids: &[String]) -> Result<HashMap<String, Horse>> {
        if horse_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; horse_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT horse_id, name, sex, birth_year, sire, dam_sire
            FROM horses WHERE horse_id IN ({placeholders})
            "#
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let horses = stmt
            .query_map(params_from_iter(horse_ids.iter()), |row| {
                Ok(Horse {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    sex: row.get(2)?,
                    birth_year: row.get(3)?,
                    sire: row.get(4)?,
                    dam_sire: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(horses.into_iter().map(|h| (h.id.clone(), h)).collect())
    }
}

impl PastResultsSource for RaceRepository {
    fn past_results(
        &self,
        horse_id: &str,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<PastPerformance>> {
        let mut batch =
            self.fetch_past_results_batch(&[horse_id.to_string()], before, limit)?;
        Ok(batch.remove(horse_id).unwrap_or_default())
    }
}

impl HorseSource for RaceRepository {
    fn horses_batch(&self, horse_ids: &[String]) -> Result<HashMap<String, Horse>> {
        self.fetch_horses_batch(horse_ids)
    }
}

fn parse_date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}

fn race_from_row(row: &Row<'_>) -> rusqlite::Result<Race> {
    let date_text: String = row.get(1)?;
    let surface_text: String = row.get(6)?;
    let condition_text: Option<String> = row.get(7)?;
    let grade_text: Option<String> = row.get(8)?;

    Ok(Race {
        id: row.get(0)?,
        date: parse_date(&date_text),
        venue: row.get(2)?,
        race_number: row.get(3)?,
        name: row.get(4)?,
        distance: row.get(5)?,
        surface: Surface::from_db(&surface_text).unwrap_or(Surface::Turf),
        track_condition: condition_text
            .map(|t| TrackCondition::from_db(&t))
            .unwrap_or(TrackCondition::Unknown),
        grade: grade_text.map(|g| Grade::from_db(&g)).unwrap_or(Grade::Unknown),
        weather: row.get(9)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<RaceResult> {
    Ok(RaceResult {
        race_id: row.get(0)?,
        horse_id: row.get(1)?,
        finish_position: row.get(2)?,
        bracket_number: row.get(3)?,
        horse_number: row.get(4)?,
        odds: row.get(5)?,
        popularity: row.get(6)?,
        weight: row.get(7)?,
        weight_diff: row.get(8)?,
        finish_time: row.get(9)?,
        margin: row.get(10)?,
        last_3f: row.get(11)?,
        sex: row.get(12)?,
        age: row.get(13)?,
        impost: row.get(14)?,
        passing_order: row.get(15)?,
        jockey_id: row.get(16)?,
        jockey_name: row.get(17)?,
    })
}

fn past_performance_from_row(row: &Row<'_>) -> rusqlite::Result<PastPerformance> {
    let date_text: String = row.get(2)?;
    let surface_text: String = row.get(4)?;
    let condition_text: Option<String> = row.get(6)?;

    Ok(PastPerformance {
        race_id: row.get(1)?,
        race_date: parse_date(&date_text),
        venue: row.get(3)?,
        surface: Surface::from_db(&surface_text).unwrap_or(Surface::Turf),
        distance: row.get(5)?,
        track_condition: condition_text
            .map(|t| TrackCondition::from_db(&t))
            .unwrap_or(TrackCondition::Unknown),
        finish_position: row.get(7)?,
        field_size: row.get(8)?,
        finish_time: row.get(9)?,
        last_3f: row.get(10)?,
        odds: row.get(11)?,
        popularity: row.get(12)?,
        passing_order: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_race(id: &str, d: NaiveDate, race_number: u32) -> Race {
        Race {
            id: id.to_string(),
            date: d,
            venue: "中山".to_string(),
            race_number,
            name: format!("テスト{race_number}"),
            distance: 2000,
            surface: Surface::Turf,
            track_condition: TrackCondition::Good,
            grade: Grade::Open,
            weather: Some("晴".to_string()),
        }
    }

    fn test_result(race_id: &str, horse_id: &str, horse_number: u32, position: u32) -> RaceResult {
        RaceResult {
            race_id: race_id.to_string(),
            horse_id: horse_id.to_string(),
            finish_position: position,
            bracket_number: (horse_number + 1) / 2,
            horse_number,
            odds: Some(2.0 * horse_number as f64),
            popularity: Some(horse_number),
            weight: Some(480),
            weight_diff: Some(0),
            finish_time: Some(120.0 + position as f64),
            margin: None,
            last_3f: Some(34.5),
            sex: Some("牡".to_string()),
            age: Some(4),
            impost: Some(57.0),
            passing_order: Some(format!("{horse_number}-{horse_number}")),
            jockey_id: Some(format!("j{horse_number}")),
            jockey_name: Some(format!("騎手{horse_number}")),
        }
    }

    fn seeded_repo() -> RaceRepository {
        let repo = RaceRepository::in_memory().unwrap();
        // three races for horse "h1" on three days
        for (i, day) in [(1u32, 10u32), (2, 15), (3, 20)] {
            let race_id = format!("2026060101{:02}", i);
            repo.insert_race(&test_race(&race_id, date(2026, 3, day), i))
                .unwrap();
            repo.insert_result(&test_result(&race_id, "h1", 1, i)).unwrap();
            repo.insert_result(&test_result(&race_id, "h2", 2, 4 - i)).unwrap();
        }
        repo
    }

    #[test]
    fn test_insert_and_fetch_race() {
        let repo = RaceRepository::in_memory().unwrap();
        let race = test_race("202606010101", date(2026, 3, 10), 1);
        repo.insert_race(&race).unwrap();

        let fetched = repo.fetch_race("202606010101").unwrap().unwrap();
        assert_eq!(fetched.id, race.id);
        assert_eq!(fetched.date, race.date);
        assert_eq!(fetched.surface, Surface::Turf);
        assert_eq!(fetched.grade, Grade::Open);

        assert!(repo.fetch_race("209906010101").unwrap().is_none());
    }

    #[test]
    fn test_fetch_race_results_ordered_by_horse_number() {
        let repo = seeded_repo();
        let results = repo.fetch_race_results("202606010101").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].horse_number, 1);
        assert_eq!(results[1].horse_number, 2);
    }

    #[test]
    fn test_past_results_strictly_before_cutoff() {
        let repo = seeded_repo();
        // cutoff on the date of the second race: only the first race shows
        let past = repo.past_results("h1", date(2026, 3, 15), 20).unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].race_date, date(2026, 3, 10));
        // the invariant holds for every row and every cutoff in the corpus
        for cutoff_day in 1..=31 {
            let cutoff = date(2026, 3, cutoff_day);
            for row in repo.past_results("h1", cutoff, 20).unwrap() {
                assert!(row.race_date < cutoff);
            }
        }
    }

    #[test]
    fn test_past_results_most_recent_first_with_field_size() {
        let repo = seeded_repo();
        let past = repo.past_results("h1", date(2026, 4, 1), 20).unwrap();
        assert_eq!(past.len(), 3);
        assert_eq!(past[0].race_date, date(2026, 3, 20));
        assert_eq!(past[2].race_date, date(2026, 3, 10));
        assert!(past.iter().all(|p| p.field_size == 2));
    }

    #[test]
    fn test_past_results_cap() {
        let repo = seeded_repo();
        let past = repo.past_results("h1", date(2026, 4, 1), 2).unwrap();
        assert_eq!(past.len(), 2);
        assert_eq!(past[0].race_date, date(2026, 3, 20));
    }

    #[test]
    fn test_batch_returns_entry_for_unknown_horse() {
        let repo = seeded_repo();
        let batch = repo
            .fetch_past_results_batch(
                &["h1".to_string(), "ghost".to_string()],
                date(2026, 4, 1),
                20,
            )
            .unwrap();
        assert_eq!(batch["h1"].len(), 3);
        assert!(batch["ghost"].is_empty());
    }

    #[test]
    fn test_horses_batch() {
        let repo = seeded_repo();
        repo.insert_horse(&Horse {
            id: "h1".to_string(),
            name: "テスト馬".to_string(),
            sex: Some("牡".to_string()),
            birth_year: Some(2022),
            sire: Some("ディープインパクト".to_string()),
            dam_sire: None,
        })
        .unwrap();

        let horses = repo
            .fetch_horses_batch(&["h1".to_string(), "h2".to_string()])
            .unwrap();
        assert_eq!(horses.len(), 1);
        assert_eq!(horses["h1"].sire.as_deref(), Some("ディープインパクト"));
    }

    #[test]
    fn test_races_in_window_ordering_and_venue_filter() {
        let repo = seeded_repo();
        let races = repo
            .fetch_races_in_window(date(2026, 3, 1), date(2026, 3, 31), None)
            .unwrap();
        assert_eq!(races.len(), 3);
        assert!(races.windows(2).all(|w| w[0].date <= w[1].date));

        let venues = vec!["東京".to_string()];
        let filtered = repo
            .fetch_races_in_window(date(2026, 3, 1), date(2026, 3, 31), Some(&venues))
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_races_before_cutoff() {
        let repo = seeded_repo();
        let races = repo.fetch_races_before(date(2026, 3, 20)).unwrap();
        assert_eq!(races.len(), 2);
        assert!(races.iter().all(|r| r.date < date(2026, 3, 20)));
    }

    #[test]
    fn test_upsert_race_keeps_single_row() {
        let repo = RaceRepository::in_memory().unwrap();
        let mut race = test_race("202606010101", date(2026, 3, 10), 1);
        repo.insert_race(&race).unwrap();
        race.name = "更新".to_string();
        repo.insert_race(&race).unwrap();

        let count: i32 = repo
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM races", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(repo.fetch_race("202606010101").unwrap().unwrap().name, "更新");
    }
}
