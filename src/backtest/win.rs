//! Win (tansho) ticket simulator.
//!
//! Buys 100 yen win tickets on the top-N predicted horses; a hit means one of
//! them won the race.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use super::simulator::{return_rate, SimulatorCore, TicketSimulator};

/// One race's win simulation.
#[derive(Debug, Clone)]
pub struct WinRaceResult {
    pub race_id: String,
    pub race_name: String,
    pub venue: String,
    pub race_date: NaiveDate,
    pub top_n_predictions: Vec<u32>,
    /// The recorded winner; absent when no payout data was available.
    pub winning_horse: Option<u32>,
    pub hit: bool,
    pub payout: u32,
    pub investment: u32,
}

/// Period summary of the win simulator.
#[derive(Debug, Clone)]
pub struct WinSummary {
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub total_races: usize,
    pub total_bets: usize,
    pub total_hits: usize,
    pub hit_rate: f64,
    pub total_investment: u32,
    pub total_payout: u32,
    pub return_rate: f64,
    pub race_results: Vec<WinRaceResult>,
}

/// Win ticket simulator.
pub struct WinSimulator {
    core: SimulatorCore,
    top_n: usize,
}

impl WinSimulator {
    pub fn new(core: SimulatorCore, top_n: usize) -> Self {
        WinSimulator { core, top_n }
    }
}

#[async_trait]
impl TicketSimulator for WinSimulator {
    type RaceOutcome = WinRaceResult;
    type Summary = WinSummary;

    fn core(&self) -> &SimulatorCore {
        &self.core
    }

    async fn simulate_race(&self, race_id: &str) -> Result<WinRaceResult> {
        let (race, predictions) = self.core.ranked_predictions(race_id)?;
        let top_n_predictions = SimulatorCore::top_numbers(&predictions, self.top_n);

        let win_payout = match self.core.payouts().win_payout(race_id).await {
            Ok(payout) => payout,
            Err(error) => {
                warn!("no win payout for {race_id}: {error}");
                None
            }
        };

        let winning_horse = win_payout.as_ref().map(|p| p.horse_number);
        let hit = winning_horse
            .map(|winner| top_n_predictions.contains(&winner))
            .unwrap_or(false);
        let payout = if hit {
            win_payout.map(|p| p.payout).unwrap_or(0)
        } else {
            0
        };

        Ok(WinRaceResult {
            race_id: race.id,
            race_name: race.name,
            venue: race.venue,
            race_date: race.date,
            investment: 100 * top_n_predictions.len() as u32,
            top_n_predictions,
            winning_horse,
            hit,
            payout,
        })
    }

    fn build_summary(
        &self,
        period_from: NaiveDate,
        period_to: NaiveDate,
        race_results: Vec<WinRaceResult>,
    ) -> WinSummary {
        let total_races = race_results.len();
        let total_bets: usize = race_results.iter().map(|r| r.top_n_predictions.len()).sum();
        let total_hits = race_results.iter().filter(|r| r.hit).count();
        let total_investment: u32 = race_results.iter().map(|r| r.investment).sum();
        let total_payout: u32 = race_results.iter().map(|r| r.payout).sum();

        let hit_rate = if total_races > 0 {
            total_hits as f64 / total_races as f64
        } else {
            0.0
        };

        WinSummary {
            period_from,
            period_to,
            total_races,
            total_bets,
            total_hits,
            hit_rate,
            total_investment,
            total_payout,
            return_rate: return_rate(total_payout, total_investment),
            race_results,
        }
    }
}
