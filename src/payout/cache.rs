//! In-memory cache for settled payouts.
//!
//! Settled payouts never change, so entries have no TTL; the cache exists so
//! repeated settlement of one race costs one network fetch.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{PlacePayout, QuinellaPayout, TrioPayout, WinPayout};

#[derive(Default)]
struct CacheInner {
    place: HashMap<String, Vec<PlacePayout>>,
    win: HashMap<String, Option<WinPayout>>,
    quinella: HashMap<String, Option<QuinellaPayout>>,
    trio: HashMap<String, Option<TrioPayout>>,
}

/// Per-client payout cache.
#[derive(Default)]
pub struct PayoutCache {
    inner: Mutex<CacheInner>,
}

impl PayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_place(&self, race_id: &str) -> Option<Vec<PlacePayout>> {
        self.inner.lock().ok()?.place.get(race_id).cloned()
    }

    pub fn put_place(&self, race_id: &str, payouts: Vec<PlacePayout>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.place.insert(race_id.to_string(), payouts);
        }
    }

    pub fn get_win(&self, race_id: &str) -> Option<Option<WinPayout>> {
        self.inner.lock().ok()?.win.get(race_id).cloned()
    }

    pub fn put_win(&self, race_id: &str, payout: Option<WinPayout>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.win.insert(race_id.to_string(), payout);
        }
    }

    pub fn get_quinella(&self, race_id: &str) -> Option<Option<QuinellaPayout>> {
        self.inner.lock().ok()?.quinella.get(race_id).cloned()
    }

    pub fn put_quinella(&self, race_id: &str, payout: Option<QuinellaPayout>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.quinella.insert(race_id.to_string(), payout);
        }
    }

    pub fn get_trio(&self, race_id: &str) -> Option<Option<TrioPayout>> {
        self.inner.lock().ok()?.trio.get(race_id).cloned()
    }

    pub fn put_trio(&self, race_id: &str, payout: Option<TrioPayout>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.trio.insert(race_id.to_string(), payout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_hit() {
        let cache = PayoutCache::new();
        assert_eq!(cache.get_win("202606010801"), None);

        let payout = WinPayout {
            horse_number: 7,
            payout: 350,
        };
        cache.put_win("202606010801", Some(payout.clone()));
        assert_eq!(cache.get_win("202606010801"), Some(Some(payout)));
    }

    #[test]
    fn test_absent_payout_is_cached_too() {
        let cache = PayoutCache::new();
        cache.put_trio("202606010801", None);
        // a cached "no payout" is a hit, distinct from a miss
        assert_eq!(cache.get_trio("202606010801"), Some(None));
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cache = PayoutCache::new();
        cache.put_place(
            "202606010801",
            vec![PlacePayout {
                horse_number: 5,
                payout: 150,
            }],
        );
        assert_eq!(cache.get_win("202606010801"), None);
        assert_eq!(cache.get_place("202606010801").unwrap().len(), 1);
    }
}
