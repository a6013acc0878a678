//! SQLite schema for historical race data.
//!
//! Tables:
//! - races: core race information
//! - horses: horse master with pedigree names
//! - race_results: one row per horse per race
//!
//! Dates are stored as YYYY-MM-DD text so lexicographic comparison matches
//! chronological order.

use rusqlite::{Connection, Result};

/// Create all tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            race_id TEXT PRIMARY KEY,
            race_date TEXT NOT NULL,
            venue TEXT NOT NULL,
            race_number INTEGER NOT NULL,
            race_name TEXT NOT NULL,
            distance INTEGER NOT NULL,
            surface TEXT NOT NULL,
            track_condition TEXT,
            grade TEXT,
            weather TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horses (
            horse_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sex TEXT,
            birth_year INTEGER,
            sire TEXT,
            dam_sire TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            horse_id TEXT NOT NULL,
            finish_position INTEGER NOT NULL,
            bracket_number INTEGER NOT NULL,
            horse_number INTEGER NOT NULL,
            odds REAL,
            popularity INTEGER,
            weight INTEGER,
            weight_diff INTEGER,
            finish_time REAL,
            margin TEXT,
            last_3f REAL,
            sex TEXT,
            age INTEGER,
            impost REAL,
            passing_order TEXT,
            jockey_id TEXT,
            jockey_name TEXT,
            UNIQUE(race_id, horse_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_races_date ON races(race_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_race_results_race ON race_results(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_race_results_horse ON race_results(horse_id)",
        [],
    )?;

    Ok(())
}
