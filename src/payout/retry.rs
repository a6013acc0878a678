//! Backoff schedule for retryable fetch failures.

use tokio::time::Duration;

/// Fixed backoff delays with a bounded retry count.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delays: [Duration; 3],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            delays: [
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
        }
    }
}

impl RetryPolicy {
    /// No waiting, no retrying. For tests and offline sources.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            delays: [Duration::ZERO; 3],
        }
    }

    /// Delay before retry number `attempt` (0-based). Attempts past the
    /// schedule reuse the last delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.delays.len() - 1);
        self.delays[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(30));
        // out-of-range attempts reuse the last delay
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(30));
    }

    #[test]
    fn test_none_policy() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }
}
