//! Error taxonomy for the prediction core.
//!
//! Factors degrade silently by returning `None`; everything that must fail
//! loudly goes through [`KeibaError`]. Payout fetching has its own error kind
//! ([`FetchError`]) so simulators can map "payout absent" conditions without
//! touching the crate error.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the prediction core.
#[derive(Debug, Error)]
pub enum KeibaError {
    /// Trainer was handed fewer samples than the configured minimum.
    #[error("insufficient training data: {actual} samples ({required} required)")]
    InsufficientTrainingData { actual: usize, required: usize },

    /// Race id is not 12 digits or carries an unknown venue code.
    #[error("invalid race id: {0}")]
    InvalidRaceId(String),

    /// A past-results query returned a row at or after its cutoff date.
    /// Programmer error; fail fast.
    #[error("data leak: row dated {row_date} returned for cutoff {cutoff}")]
    DataLeak {
        row_date: NaiveDate,
        cutoff: NaiveDate,
    },

    /// Race id does not exist in the store.
    #[error("race not found: {0}")]
    RaceNotFound(String),
}

/// Errors surfaced by a payout source.
///
/// The settlement step treats `NotYetSettled` and `Parse` as "absent payout";
/// `RetryExhausted` propagates so the per-race loop can record a zero-payout
/// race and continue.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    /// Remote is throttling (HTTP 403/429/503 class responses).
    #[error("rate limited by remote (status {0})")]
    RateLimited(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("payouts not yet settled")]
    NotYetSettled,

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },
}

impl FetchError {
    /// Whether another attempt after a backoff delay can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::RateLimited(_))
    }
}
