//! Configuration surface of the prediction core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How often the backtest engine becomes eligible to retrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrainInterval {
    Daily,
    Weekly,
    Monthly,
}

impl Default for RetrainInterval {
    fn default() -> Self {
        RetrainInterval::Weekly
    }
}

/// Backtest engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub retrain_interval: RetrainInterval,
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,
    #[serde(default = "default_max_past_results")]
    pub max_past_results_per_horse: usize,
    /// Use the cheaper training profile while walking forward.
    #[serde(default = "default_lightweight")]
    pub lightweight_training: bool,
}

fn default_min_training_samples() -> usize {
    crate::constants::MIN_TRAINING_SAMPLES
}

fn default_max_past_results() -> usize {
    crate::constants::MAX_PAST_RESULTS_PER_HORSE
}

fn default_lightweight() -> bool {
    true
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            retrain_interval: RetrainInterval::default(),
            min_training_samples: default_min_training_samples(),
            max_past_results_per_horse: default_max_past_results(),
            lightweight_training: default_lightweight(),
        }
    }
}

/// Ticket simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Restrict the period scan to these venues.
    #[serde(default)]
    pub venues: Option<Vec<String>>,
    /// Explicit model artifact; latest-by-mtime otherwise.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Global floor between payout requests, seconds.
    #[serde(default = "default_request_delay")]
    pub request_delay: f64,
}

fn default_top_n() -> usize {
    3
}

fn default_request_delay() -> f64 {
    1.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            top_n: default_top_n(),
            venues: None,
            model_path: None,
            request_delay: default_request_delay(),
        }
    }
}

/// Model artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("data/models")
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            dir: default_model_dir(),
            path: None,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/keiba.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            backtest: BacktestConfig::default(),
            simulator: SimulatorConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `keiba` config file and
    /// `KEIBA_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("keiba").required(false))
            .add_source(
                config::Environment::with_prefix("KEIBA")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.backtest.retrain_interval, RetrainInterval::Weekly);
        assert_eq!(cfg.backtest.min_training_samples, 100);
        assert_eq!(cfg.backtest.max_past_results_per_horse, 20);
        assert!(cfg.backtest.lightweight_training);
        assert_eq!(cfg.simulator.top_n, 3);
        assert_eq!(cfg.simulator.request_delay, 1.0);
        assert!(cfg.simulator.venues.is_none());
    }

    #[test]
    fn test_retrain_interval_deserializes_lowercase() {
        let interval: RetrainInterval = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(interval, RetrainInterval::Monthly);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: BacktestConfig =
            serde_json::from_str(r#"{"retrain_interval": "daily"}"#).unwrap();
        assert_eq!(cfg.retrain_interval, RetrainInterval::Daily);
        assert_eq!(cfg.min_training_samples, 100);
    }
}
