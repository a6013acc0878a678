//! Quinella (umaren) ticket simulator.
//!
//! Buys the three unordered pairs among the top-3 predictions; a hit means
//! the actual 1st/2nd pair matches one of them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use super::simulator::{return_rate, SimulatorCore, TicketSimulator};

/// One race's quinella simulation.
#[derive(Debug, Clone)]
pub struct QuinellaRaceResult {
    pub race_id: String,
    pub race_name: String,
    pub venue: String,
    pub race_date: NaiveDate,
    /// Pairs bought, each smaller number first.
    pub bet_combinations: Vec<(u32, u32)>,
    /// Actual 1st/2nd pair, absent without payout data.
    pub actual_pair: Option<(u32, u32)>,
    pub hit: bool,
    pub payout: u32,
    pub investment: u32,
}

/// Period summary of the quinella simulator.
#[derive(Debug, Clone)]
pub struct QuinellaSummary {
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub total_races: usize,
    pub total_hits: usize,
    pub hit_rate: f64,
    pub total_investment: u32,
    pub total_payout: u32,
    pub return_rate: f64,
    pub race_results: Vec<QuinellaRaceResult>,
}

/// Quinella ticket simulator.
pub struct QuinellaSimulator {
    core: SimulatorCore,
}

impl QuinellaSimulator {
    pub fn new(core: SimulatorCore) -> Self {
        QuinellaSimulator { core }
    }

    /// The three unordered pairs among the top-3 picks. Fewer than three
    /// ranked horses place no bet.
    fn bet_combinations(top3: &[u32]) -> Vec<(u32, u32)> {
        if top3.len() < 3 {
            return Vec::new();
        }
        let pair = |a: u32, b: u32| (a.min(b), a.max(b));
        vec![
            pair(top3[0], top3[1]),
            pair(top3[0], top3[2]),
            pair(top3[1], top3[2]),
        ]
    }
}

#[async_trait]
impl TicketSimulator for QuinellaSimulator {
    type RaceOutcome = QuinellaRaceResult;
    type Summary = QuinellaSummary;

    fn core(&self) -> &SimulatorCore {
        &self.core
    }

    async fn simulate_race(&self, race_id: &str) -> Result<QuinellaRaceResult> {
        let (race, predictions) = self.core.ranked_predictions(race_id)?;
        let top3 = SimulatorCore::top_numbers(&predictions, 3);
        let bet_combinations = Self::bet_combinations(&top3);

        let quinella = match self.core.payouts().quinella_payout(race_id).await {
            Ok(payout) => payout,
            Err(error) => {
                warn!("no quinella payout for {race_id}: {error}");
                None
            }
        };

        let actual_pair = quinella.as_ref().map(|q| q.pair);
        let hit = actual_pair
            .map(|pair| bet_combinations.contains(&pair))
            .unwrap_or(false);
        let payout = if hit {
            quinella.map(|q| q.payout).unwrap_or(0)
        } else {
            0
        };

        Ok(QuinellaRaceResult {
            race_id: race.id,
            race_name: race.name,
            venue: race.venue,
            race_date: race.date,
            investment: 100 * bet_combinations.len() as u32,
            bet_combinations,
            actual_pair,
            hit,
            payout,
        })
    }

    fn build_summary(
        &self,
        period_from: NaiveDate,
        period_to: NaiveDate,
        race_results: Vec<QuinellaRaceResult>,
    ) -> QuinellaSummary {
        let total_races = race_results.len();
        let total_hits = race_results.iter().filter(|r| r.hit).count();
        let total_investment: u32 = race_results.iter().map(|r| r.investment).sum();
        let total_payout: u32 = race_results.iter().map(|r| r.payout).sum();

        let hit_rate = if total_races > 0 {
            total_hits as f64 / total_races as f64
        } else {
            0.0
        };

        QuinellaSummary {
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
