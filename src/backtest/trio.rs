//! Trio (sanrenpuku) ticket simulator.
//!
//! Buys the single unordered triple of the top-3 predictions; a hit means the
//! triple equals the actual top-3 finishers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use super::simulator::{return_rate, SimulatorCore, TicketSimulator};

/// One race's trio simulation.
#[derive(Debug, Clone)]
pub struct TrioRaceResult {
    pub race_id: String,
    pub race_name: String,
    pub venue: String,
    pub race_date: NaiveDate,
    /// The bought triple, ascending; absent with fewer than three runners.
    pub predicted_trio: Option<(u32, u32, u32)>,
    /// Actual top-3 triple, absent without payout data.
    pub actual_trio: Option<(u32, u32, u32)>,
    pub hit: bool,
    pub payout: u32,
    pub investment: u32,
}

/// Period summary of the trio simulator.
#[derive(Debug, Clone)]
pub struct TrioSummary {
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub total_races: usize,
    pub total_hits: usize,
    pub hit_rate: f64,
    pub total_investment: u32,
    pub total_payout: u32,
    pub return_rate: f64,
    pub race_results: Vec<TrioRaceResult>,
}

/// Trio ticket simulator.
pub struct TrioSimulator {
    core: SimulatorCore,
}

impl TrioSimulator {
    pub fn new(core: SimulatorCore) -> Self {
        TrioSimulator { core }
    }
}

#[async_trait]
impl TicketSimulator for TrioSimulator {
    type RaceOutcome = TrioRaceResult;
    type Summary = TrioSummary;

    fn core(&self) -> &SimulatorCore {
        &self.core
    }

    async fn simulate_race(&self, race_id: &str) -> Result<TrioRaceResult> {
        let (race, predictions) = self.core.ranked_predictions(race_id)?;
        let top3 = SimulatorCore::top_numbers(&predictions, 3);

        let predicted_trio = if top3.len() == 3 {
            let mut numbers = [top3[0], top3[1], top3[2]];
            numbers.sort_unstable();
            Some((numbers[0], numbers[1], numbers[2]))
        } else {
            None
        };

        let trio_payout = match self.core.payouts().trio_payout(race_id).await {
            Ok(payout) => payout,
            Err(error) => {
                warn!("no trio payout for {race_id}: {error}");
                None
            }
        };

        let actual_trio = trio_payout.as_ref().map(|t| t.trio);
        let hit = match (predicted_trio, actual_trio) {
            (Some(predicted), Some(actual)) => predicted == actual,
            _ => false,
        };
        let payout = if hit {
            trio_payout.map(|t| t.payout).unwrap_or(0)
        } else {
            0
        };

        Ok(TrioRaceResult {
            race_id: race.id,
            race_name: race.name,
            venue: race.venue,
            race_date: race.date,
            investment: if predicted_trio.is_some() { 100 } else { 0 },
            predicted_trio,
            actual_trio,
            hit,
            payout,
        })
    }

    fn build_summary(
        &self,
        period_from: NaiveDate,
        period_to: NaiveDate,
        race_results: Vec<TrioRaceResult>,
    ) -> TrioSummary {
        let total_races = race_results.len();
        let total_hits = race_results.iter().filter(|r| r.hit).count();
        let total_investment: u32 = race_results.iter().map(|r| r.investment).sum();
        let total_payout: u32 = race_results.iter().map(|r| r.payout).sum();

        let hit_rate = if total_races > 0 {
            total_hits as f64 / total_races as f64
        } else {
            0.0
        };

        TrioSummary {
            period_from,
            period_to,
            total_races,
            total_hits,
            hit_rate,
            total_investment,
            total_payout,
            return_rate: return_rate(total_payout, total_investment),
            race_results,
        }
    }
}
