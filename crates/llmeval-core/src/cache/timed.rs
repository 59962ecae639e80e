//! Read-through cache with a fixed time-to-live per call.
//!
//! `TimedCache::get` serves a stored value while it is younger than the TTL
//! and otherwise runs the caller's producer, storing what it returns. The
//! cache never fails on its own account: unreadable or corrupt entries are
//! misses, and failed writes are only logged. Producer errors come back
//! unchanged and leave any older entry in place.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::store::KeyValueStore;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// A stored value and when it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at_epoch_millis: i64,
}

impl CacheEntry {
    /// Age in milliseconds. Timestamps in the future count as zero.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.stored_at_epoch_millis).max(0)
    }

    /// A zero TTL is never fresh.
    pub fn is_fresh(&self, ttl: Duration, now_millis: i64) -> bool {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        ttl_millis > 0 && self.age_millis(now_millis) < ttl_millis
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.stored_at_epoch_millis)
    }

    pub fn age_display(&self, now_millis: i64) -> String {
        let minutes = self.age_millis(now_millis) / MILLIS_PER_MINUTE;
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

pub struct TimedCache<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: KeyValueStore> TimedCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: KeyValueStore, C: Clock> TimedCache<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Return the value under `key` if it is fresher than `ttl`, otherwise
    /// await `produce` and store its result.
    ///
    /// Concurrent misses on the same key each run their own producer; the
    /// last one to finish wins.
    pub async fn get<T, E, F, Fut>(&self, key: &str, ttl: Duration, produce: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if key.is_empty() {
            warn!("Empty cache key, bypassing cache");
            return produce().await;
        }

        if let Some(value) = self.lookup_fresh(key, ttl) {
            debug!(cache = key, "Cache hit");
            return Ok(value);
        }

        debug!(cache = key, ttl_ms = ttl.as_millis() as u64, "Cache miss, fetching");
        let value = produce().await?;
        self.put(key, &value);
        Ok(value)
    }

    /// Drop whatever is stored under `key`.
    pub fn invalidate(&self, key: &str) {
        match self.store.remove(key) {
            Ok(()) => debug!(cache = key, "Cache invalidated"),
            Err(e) => warn!(cache = key, error = %e, "Failed to remove cache entry"),
        }
    }

    /// The stored entry regardless of age, if it parses.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache = key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == key => Some(entry),
            Ok(entry) => {
                debug!(cache = key, stored_key = %entry.key, "Cache entry stored under another key");
                None
            }
            Err(e) => {
                debug!(cache = key, error = %e, "Corrupt cache entry");
                None
            }
        }
    }

    fn lookup_fresh<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let entry = self.peek(key)?;
        if !entry.is_fresh(ttl, self.clock.now_millis()) {
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(cache = key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = key, error = %e, "Value is not JSON-serializable, not caching");
                return;
            }
        };

        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at_epoch_millis: self.clock.now_millis(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(cache = key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        if let Err(e) = self.store.write(key, &raw) {
            warn!(cache = key, error = %e, "Failed to write cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use crate::cache::clock::ManualClock;
    use crate::cache::store::{MemoryStore, StoreError, StoreResult};

    const STATS_TTL: Duration = Duration::from_millis(300_000);

    type TestCache = TimedCache<Arc<MemoryStore>, Arc<ManualClock>>;

    fn create_test_cache() -> (TestCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = TimedCache::with_clock(Arc::clone(&store), Arc::clone(&clock));
        (cache, store, clock)
    }

    async fn fetch_stats(
        cache: &TestCache,
        calls: &AtomicUsize,
        result: Result<Value, String>,
    ) -> Result<Value, String> {
        cache
            .get("stats", STATS_TTL, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                result
            })
            .await
    }

    #[tokio::test]
    async fn test_second_get_within_ttl_is_served_from_cache() {
        let (cache, _store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        let first = fetch_stats(&cache, &calls, Ok(json!({"total": 10}))).await;
        let second = fetch_stats(&cache, &calls, Ok(json!({"total": 99}))).await;

        assert_eq!(first, Ok(json!({"total": 10})));
        assert_eq!(second, Ok(json!({"total": 10})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_statistics_ttl_timeline() {
        let (cache, _store, clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        // t=0: miss
        let value = fetch_stats(&cache, &calls, Ok(json!({"total": 10}))).await;
        assert_eq!(value, Ok(json!({"total": 10})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // t=60000: within the five minute window
        clock.set(60_000);
        let value = fetch_stats(&cache, &calls, Ok(json!({"total": 15}))).await;
        assert_eq!(value, Ok(json!({"total": 10})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // t=360000: past the window
        clock.set(360_000);
        let value = fetch_stats(&cache, &calls, Ok(json!({"total": 15}))).await;
        assert_eq!(value, Ok(json!({"total": 15})));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let entry = cache.peek("stats").expect("entry should be stored");
        assert_eq!(entry.value, json!({"total": 15}));
        assert_eq!(entry.stored_at_epoch_millis, 360_000);
    }

    #[tokio::test]
    async fn test_entry_expires_exactly_at_ttl() {
        let (cache, _store, clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        fetch_stats(&cache, &calls, Ok(json!(1))).await.unwrap();
        clock.set(299_999);
        fetch_stats(&cache, &calls, Ok(json!(2))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(300_000);
        fetch_stats(&cache, &calls, Ok(json!(3))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let (cache, _store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get("stats", Duration::ZERO, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({"total": 1}))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_mid_ttl_forces_refetch() {
        let (cache, _store, clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        fetch_stats(&cache, &calls, Ok(json!({"total": 10}))).await.unwrap();

        clock.set(60_000);
        cache.invalidate("stats");
        assert!(cache.peek("stats").is_none());

        let value = fetch_stats(&cache, &calls, Ok(json!({"total": 12}))).await;
        assert_eq!(value, Ok(json!({"total": 12})));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_absent_key_is_noop() {
        let (cache, store, _clock) = create_test_cache();
        cache.invalidate("never-stored");
        cache.invalidate("never-stored");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_producer_failure_keeps_stale_entry() {
        let (cache, _store, clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        fetch_stats(&cache, &calls, Ok(json!({"total": 10}))).await.unwrap();

        clock.set(400_000);
        let result = fetch_stats(&cache, &calls, Err("backend down".to_string())).await;
        assert_eq!(result, Err("backend down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let stale = cache.peek("stats").expect("stale entry must survive");
        assert_eq!(stale.value, json!({"total": 10}));
        assert_eq!(stale.stored_at_epoch_millis, 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss_and_gets_overwritten() {
        let (cache, store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);
        store.write("stats", "{not json").unwrap();

        let value = fetch_stats(&cache, &calls, Ok(json!({"total": 10}))).await;
        assert_eq!(value, Ok(json!({"total": 10})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let raw = store.read("stats").unwrap().unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).expect("entry should be well-formed");
        assert_eq!(entry.value, json!({"total": 10}));
    }

    #[tokio::test]
    async fn test_entry_under_foreign_key_is_ignored() {
        let (cache, store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);
        let foreign = CacheEntry {
            key: "other".to_string(),
            value: json!({"total": 1}),
            stored_at_epoch_millis: 0,
        };
        store
            .write("stats", &serde_json::to_string(&foreign).unwrap())
            .unwrap();

        fetch_stats(&cache, &calls, Ok(json!({"total": 2}))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_typed_values_and_shape_mismatch() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Totals {
            total: u64,
        }

        let (cache, _store, _clock) = create_test_cache();
        cache
            .get("shape", STATS_TTL, || async { Ok::<_, String>(json!("a string")) })
            .await
            .unwrap();

        // Stored value does not fit `Totals`, so the producer runs
        let totals: Totals = cache
            .get("shape", STATS_TTL, || async { Ok::<_, String>(Totals { total: 7 }) })
            .await
            .unwrap();
        assert_eq!(totals, Totals { total: 7 });

        let again: Totals = cache
            .get("shape", STATS_TTL, || async {
                Err::<Totals, _>("should not be called".to_string())
            })
            .await
            .unwrap();
        assert_eq!(again, Totals { total: 7 });
    }

    #[tokio::test]
    async fn test_empty_key_bypasses_store() {
        let (cache, store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get("", STATS_TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!(1))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_future_timestamp_counts_as_fresh() {
        let (cache, _store, clock) = create_test_cache();
        let calls = AtomicUsize::new(0);

        clock.set(1_000_000);
        fetch_stats(&cache, &calls, Ok(json!(1))).await.unwrap();

        // Clock went backwards
        clock.set(0);
        fetch_stats(&cache, &calls, Ok(json!(2))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Store whose medium is gone: every operation fails.
    struct UnavailableStore;

    impl KeyValueStore for UnavailableStore {
        fn read(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("storage disabled".to_string()))
        }

        fn write(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("storage disabled".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_passthrough() {
        let cache = TimedCache::with_clock(UnavailableStore, ManualClock::new(0));
        let calls = AtomicUsize::new(0);

        for expected in 1..=2 {
            let value = cache
                .get("stats", STATS_TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({"total": 10}))
                })
                .await;
            assert_eq!(value, Ok(json!({"total": 10})));
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }

        cache.invalidate("stats");
        assert!(cache.peek("stats").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_each_fetch_and_last_write_wins() {
        let (cache, _store, _clock) = create_test_cache();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let (tx_first, rx_first) = tokio::sync::oneshot::channel::<Value>();
        let (tx_second, rx_second) = tokio::sync::oneshot::channel::<Value>();

        let first = cache.get("stats", STATS_TTL, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            rx_first.await.map_err(|_| "sender dropped".to_string())
        });
        let second = cache.get("stats", STATS_TTL, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            rx_second.await.map_err(|_| "sender dropped".to_string())
        });
        tokio::pin!(first);
        tokio::pin!(second);

        // Both miss and start their own fetch; nothing is shared
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tx_second.send(json!({"total": 2})).unwrap();
        assert_eq!(second.await, Ok(json!({"total": 2})));

        tx_first.send(json!({"total": 1})).unwrap();
        assert_eq!(first.await, Ok(json!({"total": 1})));

        // The slower fetch finished last, so its value is what stays stored
        let entry = cache.peek("stats").expect("entry stored");
        assert_eq!(entry.value, json!({"total": 1}));
    }

    #[test]
    fn test_cache_entry_age_display() {
        let entry = CacheEntry {
            key: "stats".to_string(),
            value: Value::Null,
            stored_at_epoch_millis: 0,
        };

        assert_eq!(entry.age_display(-5_000), "just now");
        assert_eq!(entry.age_display(30_000), "just now");
        assert_eq!(entry.age_display(5 * MILLIS_PER_MINUTE), "5m ago");
        assert_eq!(entry.age_display(90 * MILLIS_PER_MINUTE), "2h ago");
        assert_eq!(entry.age_display(70 * MILLIS_PER_MINUTE), "1h ago");
        assert_eq!(entry.age_display(3 * 1440 * MILLIS_PER_MINUTE), "3d ago");
        assert!(entry.stored_at().is_some());
    }
}
