//! Inference over a fitted model.

use ndarray::Array2;

use crate::ml::trainer::TrainedModel;

/// One horse annotated with its predicted probability and rank.
#[derive(Debug, Clone)]
pub struct RankedPrediction {
    pub rank: u32,
    pub horse_id: String,
    pub probability: f64,
}

/// Wraps a fitted model for race-field inference.
pub struct Predictor {
    model: TrainedModel,
}

impl Predictor {
    pub fn new(model: TrainedModel) -> Self {
        Predictor { model }
    }

    pub fn num_features(&self) -> usize {
        self.model.num_features
    }

    /// P(top 3) per row.
    pub fn predict_probabilities(&self, features: &Array2<f32>) -> Vec<f64> {
        self.model.predict_probabilities(features)
    }

    /// Rank a race field by predicted probability, descending. Ranks are
    /// 1-based; probability ties resolve to the earlier row for determinism.
    pub fn predict_with_ranking(
        &self,
        features: &Array2<f32>,
        horse_ids: &[String],
    ) -> Vec<RankedPrediction> {
        let probs = self.predict_probabilities(features);

        let mut ranked: Vec<RankedPrediction> = horse_ids
            .iter()
            .zip(probs)
            .map(|(horse_id, probability)| RankedPrediction {
                rank: 0,
                horse_id: horse_id.clone(),
                probability,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, prediction) in ranked.iter_mut().enumerate() {
            prediction.rank = (i + 1) as u32;
        }
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::NUM_FEATURES;
    use crate::ml::trainer::{Trainer, TrainingParams};

    fn trained_predictor() -> Predictor {
        let n = 150;
        let mut x = Array2::<f32>::zeros((n, NUM_FEATURES));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let positive = i % 3 == 0;
            x[[i, 0]] = if positive { 90.0 } else { 10.0 };
            x[[i, 3]] = (i % 5) as f32;
            y.push(positive as u8);
        }
        let model = Trainer::new(TrainingParams::lightweight()).fit(&x, &y).unwrap();
        Predictor::new(model)
    }

    #[test]
    fn test_ranking_is_probability_descending() {
        let predictor = trained_predictor();

        let mut field = Array2::<f32>::zeros((3, NUM_FEATURES));
        field[[0, 0]] = 10.0;
        field[[1, 0]] = 90.0;
        field[[2, 0]] = 50.0;
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let ranked = predictor.predict_with_ranking(&field, &ids);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].horse_id, "b");
        assert!(ranked[0].probability >= ranked[1].probability);
        assert!(ranked[1].probability >= ranked[2].probability);
        assert_eq!(
            ranked.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let predictor = trained_predictor();
        let mut field = Array2::<f32>::zeros((4, NUM_FEATURES));
        for i in 0..4 {
            field[[i, 0]] = 42.0;
        }
        let ids: Vec<String> = (1..=4).map(|i| format!("h{i}")).collect();

        let first = predictor.predict_with_ranking(&field, &ids);
        let second = predictor.predict_with_ranking(&field, &ids);
        let order_a: Vec<&str> = first.iter().map(|r| r.horse_id.as_str()).collect();
        let order_b: Vec<&str> = second.iter().map(|r| r.horse_id.as_str()).collect();
        assert_eq!(order_a, order_b);
    }
}
