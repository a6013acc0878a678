//! keiba-core
//!
//! Horse racing prediction core for JRA data: seven-factor scoring with a
//! weighted aggregator, a gradient-boosted top-3 probability model, a
//! leak-free walk-forward backtest engine, and bet-ticket simulators
//! (place / win / quinella / trio) settled against fetched payouts through a
//! shared rate-limited client.
//!
//! Scraping, the CLI and report writers live outside this crate; they reach
//! in through the [`payout::PayoutSource`] capability and the read contracts
//! of [`storage::RaceRepository`].

pub mod backtest;
pub mod config;
pub mod constants;
pub mod error;
pub mod factors;
pub mod features;
pub mod ml;
pub mod payout;
pub mod pedigree;
pub mod prediction;
pub mod score;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{FetchError, KeibaError};
pub use prediction::{PredictionResult, PredictionService};
