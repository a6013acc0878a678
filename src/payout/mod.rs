//! Payout fetching: the scraper-facing capability and the rate-limited,
//! retrying, caching client the simulators share.

pub mod cache;
pub mod rate_limiter;
pub mod retry;

use async_trait::async_trait;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use crate::error::FetchError;

pub use cache::PayoutCache;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;

/// Default bound on a single payout request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One placed horse's payout per 100 yen staked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacePayout {
    pub horse_number: u32,
    pub payout: u32,
}

/// Winner's payout per 100 yen staked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinPayout {
    pub horse_number: u32,
    pub payout: u32,
}

/// Unordered 1st/2nd pair payout. The pair is stored smaller number first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuinellaPayout {
    pub pair: (u32, u32),
    pub payout: u32,
}

impl QuinellaPayout {
    pub fn new(a: u32, b: u32, payout: u32) -> Self {
        QuinellaPayout {
            pair: (a.min(b), a.max(b)),
            payout,
        }
    }
}

/// Unordered top-3 triple payout. The triple is stored ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrioPayout {
    pub trio: (u32, u32, u32),
    pub payout: u32,
}

impl TrioPayout {
    pub fn new(a: u32, b: u32, c: u32, payout: u32) -> Self {
        let mut numbers = [a, b, c];
        numbers.sort_unstable();
        TrioPayout {
            trio: (numbers[0], numbers[1], numbers[2]),
            payout,
        }
    }
}

/// The scraper-side capability the core depends on. Implementations fetch
/// settled payouts for one race; the client layers pacing, timeout, retry
/// and caching on top.
#[async_trait]
pub trait PayoutSource: Send + Sync {
    /// Place (fukusho) payouts for the 2-3 placed horses.
    async fn fetch_place_payouts(&self, race_id: &str) -> Result<Vec<PlacePayout>, FetchError>;

    /// Win (tansho) payout, absent when unsettled.
    async fn fetch_win_payout(&self, race_id: &str) -> Result<Option<WinPayout>, FetchError>;

    /// Quinella (umaren) payout, absent when unsettled.
    async fn fetch_quinella_payout(
        &self,
        race_id: &str,
    ) -> Result<Option<QuinellaPayout>, FetchError>;

    /// Trio (sanrenpuku) payout, absent when unsettled.
    async fn fetch_trio_payout(&self, race_id: &str) -> Result<Option<TrioPayout>, FetchError>;
}

/// Rate-limited payout client. Composes one [`RateLimiter`] pacing clock with
/// a bounded request timeout, fixed-backoff retries and a payout cache.
///
/// `NotYetSettled` and parse failures come back as "no payout"; only an
/// exhausted retry budget surfaces as an error, which per-race loops record
/// as a zero-payout race.
pub struct PayoutClient {
    source: Box<dyn PayoutSource>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    request_timeout: Duration,
    cache: PayoutCache,
}

impl PayoutClient {
    pub fn new(source: impl PayoutSource + 'static, limiter: RateLimiter) -> Self {
        PayoutClient {
            source: Box::new(source),
            limiter,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache: PayoutCache::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Place payouts; empty when the race has no settled place payout.
    pub async fn place_payouts(&self, race_id: &str) -> Result<Vec<PlacePayout>, FetchError> {
        if let Some(hit) = self.cache.get_place(race_id) {
            return Ok(hit);
        }

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let outcome = match timeout(
                self.request_timeout,
                self.source.fetch_place_payouts(race_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network("request timed out".into())),
            };

            match outcome {
                Ok(payouts) => {
                    self.cache.put_place(race_id, payouts.clone());
                    return Ok(payouts);
                }
                Err(error) => match self.absorb_or_backoff("place", race_id, error, &mut attempt).await? {
                    Absorbed::AsAbsent => return Ok(Vec::new()),
                    Absorbed::Retrying => continue,
                },
            }
        }
    }

    /// Win payout, absent when unsettled or unparseable.
    pub async fn win_payout(&self, race_id: &str) -> Result<Option<WinPayout>, FetchError> {
        if let Some(hit) = self.cache.get_win(race_id) {
            return Ok(hit);
        }

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let outcome = match timeout(self.request_timeout, self.source.fetch_win_payout(race_id))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network("request timed out".into())),
            };

            match outcome {
                Ok(payout) => {
                    self.cache.put_win(race_id, payout.clone());
                    return Ok(payout);
                }
                Err(error) => match self.absorb_or_backoff("win", race_id, error, &mut attempt).await? {
                    Absorbed::AsAbsent => return Ok(None),
                    Absorbed::Retrying => continue,
                },
            }
        }
    }

    /// Quinella payout, absent when unsettled or unparseable.
    pub async fn quinella_payout(
        &self,
        race_id: &str,
    ) -> Result<Option<QuinellaPayout>, FetchError> {
        if let Some(hit) = self.cache.get_quinella(race_id) {
            return Ok(hit);
        }

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let outcome = match timeout(
                self.request_timeout,
                self.source.fetch_quinella_payout(race_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network("request timed out".into())),
            };

            match outcome {
                Ok(payout) => {
                    self.cache.put_quinella(race_id, payout.clone());
                    return Ok(payout);
                }
                Err(error) => {
                    match self.absorb_or_backoff("quinella", race_id, error, &mut attempt).await? {
                        Absorbed::AsAbsent => return Ok(None),
                        Absorbed::Retrying => continue,
                    }
                }
            }
        }
    }

    /// Trio payout, absent when unsettled or unparseable.
    pub async fn trio_payout(&self, race_id: &str) -> Result<Option<TrioPayout>, FetchError> {
        if let Some(hit) = self.cache.get_trio(race_id) {
            return Ok(hit);
        }

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let outcome = match timeout(self.request_timeout, self.source.fetch_trio_payout(race_id))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network("request timed out".into())),
            };

            match outcome {
                Ok(payout) => {
                    self.cache.put_trio(race_id, payout.clone());
                    return Ok(payout);
                }
                Err(error) => match self.absorb_or_backoff("trio", race_id, error, &mut attempt).await? {
                    Absorbed::AsAbsent => return Ok(None),
                    Absorbed::Retrying => continue,
                },
            }
        }
    }

    /// Classify a fetch failure: unsettled/parse failures absorb into "no
    /// payout", retryable failures wait out the backoff schedule until the
    /// budget runs dry.
    async fn absorb_or_backoff(
        &self,
        what: &str,
        race_id: &str,
        error: FetchError,
        attempt: &mut u32,
    ) -> Result<Absorbed, FetchError> {
        match error {
            FetchError::NotYetSettled => {
                debug!("{what} payouts not yet settled for {race_id}");
                Ok(Absorbed::AsAbsent)
            }
            FetchError::Parse(cause) => {
                warn!("{what} payout parse failed for {race_id}: {cause}");
                Ok(Absorbed::AsAbsent)
            }
            error if error.is_retryable() && *attempt < self.retry.max_retries => {
                let delay = self.retry.delay_for_attempt(*attempt);
                warn!(
                    "{what} payout fetch failed for {race_id} (attempt {}/{}): {error}. Retrying in {:?}",
                    *attempt + 1,
                    self.retry.max_retries,
                    delay
                );
                sleep(delay).await;
                *attempt += 1;
                Ok(Absorbed::Retrying)
            }
            error => Err(FetchError::RetryExhausted {
                attempts: *attempt + 1,
                last: error.to_string(),
            }),
        }
    }
}

enum Absorbed {
    AsAbsent,
    Retrying,
}
