//! Place (fukusho) ticket simulator.
//!
//! Buys 100 yen place tickets on the top-N predicted horses; any of them
//! finishing in the top 3 pays out.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use super::simulator::{return_rate, SimulatorCore, TicketSimulator};

/// One race's place simulation.
#[derive(Debug, Clone)]
pub struct PlaceRaceResult {
    pub race_id: String,
    pub race_name: String,
    pub venue: String,
    pub race_date: NaiveDate,
    pub top_n_predictions: Vec<u32>,
    /// Horse numbers with a place payout (the 2-3 placed horses).
    pub place_horses: Vec<u32>,
    /// Selected horses that placed, in selection order.
    pub hits: Vec<u32>,
    /// Payout per hit, parallel to `hits`.
    pub payouts: Vec<u32>,
    pub investment: u32,
    pub payout_total: u32,
}

/// Period summary of the place simulator.
#[derive(Debug, Clone)]
pub struct PlaceSummary {
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub total_races: usize,
    pub total_bets: usize,
    pub total_hits: usize,
    pub hit_rate: f64,
    pub total_investment: u32,
    pub total_payout: u32,
    pub return_rate: f64,
    pub race_results: Vec<PlaceRaceResult>,
}

/// Place ticket simulator.
pub struct PlaceSimulator {
    core: SimulatorCore,
    top_n: usize,
}

impl PlaceSimulator {
    pub fn new(core: SimulatorCore, top_n: usize) -> Self {
        PlaceSimulator { core, top_n }
    }
}

#[async_trait]
impl TicketSimulator for PlaceSimulator {
    type RaceOutcome = PlaceRaceResult;
    type Summary = PlaceSummary;

    fn core(&self) -> &SimulatorCore {
        &self.core
    }

    async fn simulate_race(&self, race_id: &str) -> Result<PlaceRaceResult> {
        let (race, predictions) = self.core.ranked_predictions(race_id)?;
        let top_n_predictions = SimulatorCore::top_numbers(&predictions, self.top_n);

        let place_payouts = match self.core.payouts().place_payouts(race_id).await {
            Ok(payouts) => payouts,
            Err(error) => {
                warn!("no place payout for {race_id}: {error}");
                Vec::new()
            }
        };

        let place_horses: Vec<u32> = place_payouts.iter().map(|p| p.horse_number).collect();
        let mut hits = Vec::new();
        let mut payouts = Vec::new();
        for &selected in &top_n_predictions {
            if let Some(placed) = place_payouts.iter().find(|p| p.horse_number == selected) {
                hits.push(selected);
                payouts.push(placed.payout);
            }
        }

        // a short field buys fewer tickets than top_n
        let investment = 100 * top_n_predictions.len() as u32;
        let payout_total = payouts.iter().sum();

        Ok(PlaceRaceResult {
            race_id: race.id,
            race_name: race.name,
            venue: race.venue,
            race_date: race.date,
            top_n_predictions,
            place_horses,
            hits,
            payouts,
            investment,
            payout_total,
        })
    }

    fn build_summary(
        &self,
        period_from: NaiveDate,
        period_to: NaiveDate,
        race_results: Vec<PlaceRaceResult>,
    ) -> PlaceSummary {
        let total_races = race_results.len();
        let total_bets: usize = race_results.iter().map(|r| r.top_n_predictions.len()).sum();
        let total_hits: usize = race_results.iter().map(|r| r.hits.len()).sum();
        let total_investment: u32 = race_results.iter().map(|r| r.investment).sum();
        let total_payout: u32 = race_results.iter().map(|r| r.payout_total).sum();

        let hit_rate = if total_bets > 0 {
            total_hits as f64 / total_bets as f64
        } else {
            0.0
        };

        PlaceSummary {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::simulator::tests::{date, scripted_core, ScriptedPayouts, TARGET_RACE};
    use crate::payout::PlacePayout;

    fn scripted_payouts() -> ScriptedPayouts {
        ScriptedPayouts {
            place: vec![
                PlacePayout { horse_number: 5, payout: 150 },
                PlacePayout { horse_number: 3, payout: 280 },
                PlacePayout { horse_number: 7, payout: 190 },
            ],
            ..ScriptedPayouts::default()
        }
    }

    #[tokio::test]
    async fn test_two_of_three_hit() {
        // predicted 5,3,8; placed {5,3,7} paying 150/280/190
        let simulator = PlaceSimulator::new(scripted_core(scripted_payouts()), 3);
        let result = simulator.simulate_race(TARGET_RACE).await.unwrap();

        assert_eq!(result.top_n_predictions, vec![5, 3, 8]);
        assert_eq!(result.place_horses, vec![5, 3, 7]);
        assert_eq!(result.hits, vec![5, 3]);
        assert_eq!(result.payouts, vec![150, 280]);
        assert_eq!(result.investment, 300);
        assert_eq!(result.payout_total, 430);
    }

    #[tokio::test]
    async fn test_period_summary_identities() {
        let simulator = PlaceSimulator::new(scripted_core(scripted_payouts()), 3);
        let summary = simulator
            .simulate_period(date(2025, 6, 10), date(2025, 6, 20), None)
            .await
            .unwrap();

        assert_eq!(summary.total_races, 1);
        assert_eq!(summary.total_bets, 3);
        assert_eq!(summary.total_hits, 2);
        assert_eq!(summary.total_investment, 300);
        assert_eq!(summary.total_payout, 430);
        assert!((summary.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.return_rate - 430.0 / 300.0).abs() < 1e-9);
        // return_rate x investment reproduces the payout
        let recovered = summary.return_rate * summary.total_investment as f64;
        assert!((recovered - summary.total_payout as f64).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_fetch_failure_records_zero_payout_race() {
        let payouts = ScriptedPayouts {
            fail: true,
            ..ScriptedPayouts::default()
        };
        let simulator = PlaceSimulator::new(scripted_core(payouts), 3);
        let result = simulator.simulate_race(TARGET_RACE).await.unwrap();

        // the race is recorded, not skipped
        assert_eq!(result.investment, 300);
        assert_eq!(result.payout_total, 0);
        assert!(result.hits.is_empty());
        assert!(result.place_horses.is_empty());
    }

    #[tokio::test]
    async fn test_short_field_buys_fewer_tickets() {
        let simulator = PlaceSimulator::new(scripted_core(scripted_payouts()), 15);
        let result = simulator.simulate_race(TARGET_RACE).await.unwrap();
        // only 10 runners exist
        assert_eq!(result.top_n_predictions.len(), 10);
        assert_eq!(result.investment, 1000);
    }

    #[tokio::test]
    async fn test_period_continues_past_bad_race() {
        use crate::backtest::simulator::tests::scripted_core_with;
        use crate::types::{Grade, Race, Surface, TrackCondition};

        // a race with an unparseable id inside the window fails its own
        // simulation but never aborts the period
        let core = scripted_core_with(scripted_payouts(), |repo| {
            repo.insert_race(&Race {
                id: "broken".to_string(),
                date: date(2025, 6, 12),
                venue: "東京".to_string(),
                race_number: 1,
                name: "壊れたレース".to_string(),
                distance: 1600,
                surface: Surface::Turf,
                track_condition: TrackCondition::Good,
                grade: Grade::Unknown,
                weather: None,
            })
            .unwrap();
        });

        let simulator = PlaceSimulator::new(core, 3);
        let summary = simulator
            .simulate_period(date(2025, 6, 10), date(2025, 6, 20), None)
            .await
            .unwrap();
        assert_eq!(summary.total_races, 1);
    }
}
