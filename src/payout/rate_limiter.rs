//! Request pacing for the payout fetcher.
//!
//! One pacing clock is shared by cloning: every clone waits on the same
//! last-request timestamp, so all fetches in the process observe the global
//! minimum inter-request interval. The timestamp advances on error paths
//! too, since it is stamped before the request goes out.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Minimum-interval rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        RateLimiter {
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Build from the `request_delay` config value.
    pub fn from_delay_secs(delay_secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(delay_secs.max(0.0)))
    }

    /// Wait until the minimum interval since the previous request has
    /// elapsed, then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
