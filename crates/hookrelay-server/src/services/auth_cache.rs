//! Time-bounded cache with an injected clock.

use chrono::{DateTime, Duration, Utc};
use hookrelay_core::Clock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Entries live for `ttl` from insertion. Expired entries are dropped on
/// lookup; there is no background sweeper.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (DateTime<Utc>, V)>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((stored_at, value)) if now - *stored_at < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, (now, value));
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hookrelay_core::ManualClock;

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::minutes(5), clock.clone());

        cache.insert("m1".to_string(), 7);
        clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert_eq!(cache.get(&"m1".to_string()), Some(7));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&"m1".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_restarts_ttl() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache: TtlCache<&'static str, &'static str> = TtlCache::new(Duration::seconds(10), clock.clone());

        cache.insert("k", "a");
        clock.advance(Duration::seconds(8));
        cache.insert("k", "b");
        clock.advance(Duration::seconds(8));
        assert_eq!(cache.get(&"k"), Some("b"));
        assert!(cache.invalidate(&"k"));
        assert_eq!(cache.get(&"k"), None);
    }
}
