//! SQLite-backed storage for historical race data.

pub mod repository;
pub mod schema;

pub use repository::{HorseSource, PastResultsSource, RaceRepository};
