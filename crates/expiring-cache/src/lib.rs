//! A keyed in-memory cache that is safe for cooperative (async) concurrency.
//!
//! The cache is all-or-nothing: the update function returns the **entire**
//! replacement contents on a miss. Incremental insertion is deliberately not
//! supported.

#[macro_use]
extern crate tracing;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use time::OffsetDateTime;

/// A value that is only valid up to an optional instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringValue<V> {
    /// `None` means the value never expires.
    pub expiry: Option<OffsetDateTime>,
    pub value: V,
}

impl<V> ExpiringValue<V> {
    pub fn new(expiry: Option<OffsetDateTime>, value: V) -> Self {
        Self { expiry, value }
    }

    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => OffsetDateTime::now_utc() >= expiry,
            None => false,
        }
    }
}

/// The update callback invoked on a cache miss.
///
/// Returns the full replacement contents for the cache. An error aborts the
/// update and leaves the previous contents untouched.
pub type UpdateFn<A, K, V> = Arc<
    dyn Fn(A) -> Pin<Box<dyn Future<Output = anyhow::Result<HashMap<K, ExpiringValue<V>>>> + Send>>
        + Send
        + Sync,
>;

pub struct ExpiringCache<A, K, V> {
    entries: RwLock<Arc<HashMap<K, ExpiringValue<V>>>>,
    update_lock: tokio::sync::Mutex<()>,
    update_fn: UpdateFn<A, K, V>,
    force_update_delay: Duration,
}

impl<A, K, V> ExpiringCache<A, K, V>
where
    A: Clone + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(update_fn: UpdateFn<A, K, V>) -> Self {
        Self::with_force_update_delay(update_fn, Duration::from_secs(1))
    }

    pub fn with_force_update_delay(update_fn: UpdateFn<A, K, V>, force_update_delay: Duration) -> Self {
        Self {
            entries: RwLock::new(Arc::new(HashMap::new())),
            update_lock: tokio::sync::Mutex::new(()),
            update_fn,
            force_update_delay,
        }
    }

    /// Drops the cache contents atomically.
    pub fn clear(&self) {
        *self.entries.write() = Arc::new(HashMap::new());
    }

    /// Reads an entry without consulting expiry bookkeeping beyond the usual
    /// "present and not expired" check. No locking beyond the snapshot read.
    fn fetch(&self, key: &K) -> Option<ExpiringValue<V>> {
        self.entries.read().get(key).cloned()
    }

    fn fetch_live(&self, key: &K) -> Option<ExpiringValue<V>> {
        self.fetch(key).filter(|entry| !entry.is_expired())
    }

    /// Fetches the value for `key`, refreshing the whole cache on a miss or
    /// an expired entry. Returns the entry even if it is still expired after
    /// the refresh attempt.
    ///
    /// Errors from the update function propagate and leave the cache as-is.
    pub async fn get_ignore_expiry(&self, update_arg: A, key: &K) -> anyhow::Result<Option<ExpiringValue<V>>> {
        // Fast path outside the update lock; the expectation is that nearly
        // every request is served here.
        if let Some(entry) = self.fetch_live(key) {
            return Ok(Some(entry));
        }

        let _guard = self.update_lock.lock().await;

        // Another task may have refreshed while we waited on the lock.
        if let Some(entry) = self.fetch_live(key) {
            return Ok(Some(entry));
        }

        let replacement = (self.update_fn)(update_arg).await?;
        *self.entries.write() = Arc::new(replacement);

        // Final read under the update lock: if the key is still absent it is
        // definitively not part of the current valid contents.
        Ok(self.fetch(key))
    }

    /// Fetches the value for `key`, refreshing the whole cache on a miss.
    /// Entries that remain expired after the refresh are reported as absent.
    pub async fn get(&self, update_arg: A, key: &K) -> anyhow::Result<Option<V>> {
        match self.get_ignore_expiry(update_arg, key).await? {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    /// Refreshes the cache, holding the update lock and retrying until an
    /// update succeeds. Update errors are logged, never returned.
    pub async fn force_update(&self, update_arg: A) {
        let _guard = self.update_lock.lock().await;

        loop {
            match (self.update_fn)(update_arg.clone()).await {
                Ok(replacement) => {
                    *self.entries.write() = Arc::new(replacement);
                    return;
                }
                Err(error) => {
                    error!(error = format!("{error:#}"), "Cache update failed; retrying");
                    tokio::time::sleep(self.force_update_delay).await;
                }
            }
        }
    }

    /// Lock-free read. On a miss, schedules `force_update` on the current
    /// runtime (best effort) and returns `None` immediately.
    pub fn get_sync(self: &Arc<Self>, update_arg: A, key: &K) -> Option<V> {
        if let Some(entry) = self.fetch_live(key) {
            return Some(entry.value);
        }

        let this = Arc::clone(self);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { this.force_update(update_arg).await });
        } else {
            warn!("No async runtime available to schedule a cache refresh");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_update(
        calls: Arc<AtomicUsize>,
        expiry: Option<OffsetDateTime>,
    ) -> UpdateFn<(), &'static str, u32> {
        Arc::new(move |()| {
            let calls = Arc::clone(&calls);
            let expiry = expiry;
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let mut contents = HashMap::new();
                contents.insert("a", ExpiringValue::new(expiry, 1));
                contents.insert("b", ExpiringValue::new(expiry, 2));
                Ok(contents)
            })
        })
    }

    #[tokio::test]
    async fn miss_populates_then_hits_without_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ExpiringCache::new(counting_update(Arc::clone(&calls), None));

        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
        assert_eq!(cache.get((), &"b").await.unwrap(), Some(2));
        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_key_refreshes_once_per_lookup_and_returns_none() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ExpiringCache::new(counting_update(Arc::clone(&calls), None));

        assert_eq!(cache.get((), &"nope").await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_returned_by_get_ignore_expiry_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let past = OffsetDateTime::now_utc() - time::Duration::hours(1);
        let cache = ExpiringCache::new(counting_update(Arc::clone(&calls), Some(past)));

        let entry = cache.get_ignore_expiry((), &"a").await.unwrap();
        assert_eq!(entry.map(|e| e.value), Some(1));

        assert_eq!(cache.get((), &"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_error_propagates_and_preserves_contents() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let update: UpdateFn<(), &'static str, u32> = Arc::new({
            let attempts = Arc::clone(&attempts);
            move |()| {
                let attempts = Arc::clone(&attempts);
                Box::pin(async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        let mut contents = HashMap::new();
                        contents.insert("a", ExpiringValue::new(None, 1));
                        Ok(contents)
                    } else {
                        anyhow::bail!("database unavailable")
                    }
                })
            }
        });
        let cache = ExpiringCache::new(update);

        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
        assert!(cache.get((), &"missing").await.is_err());
        // Prior contents survive the failed update.
        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn concurrent_misses_trigger_a_single_update() {
        let calls = Arc::new(AtomicUsize::new(0));
        let update: UpdateFn<(), &'static str, u32> = Arc::new({
            let calls = Arc::clone(&calls);
            move |()| {
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    // Widen the race window so every waiter piles on the lock.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let mut contents = HashMap::new();
                    contents.insert("a", ExpiringValue::new(None, 1));
                    Ok(contents)
                })
            }
        });
        let cache = Arc::new(ExpiringCache::new(update));

        let lookups = (0..8).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get((), &"a").await.unwrap() })
        });
        for handle in lookups {
            assert_eq!(handle.await.unwrap(), Some(1));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_update_retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let update: UpdateFn<(), &'static str, u32> = Arc::new({
            let attempts = Arc::clone(&attempts);
            move |()| {
                let attempts = Arc::clone(&attempts);
                Box::pin(async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        anyhow::bail!("transient")
                    }
                    let mut contents = HashMap::new();
                    contents.insert("a", ExpiringValue::new(None, 9));
                    Ok(contents)
                })
            }
        });
        let cache =
            ExpiringCache::with_force_update_delay(update, Duration::from_millis(1));

        cache.force_update(()).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(cache.fetch_live(&"a").map(|e| e.value), Some(9));
    }

    #[tokio::test]
    async fn get_sync_misses_then_is_eventually_populated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ExpiringCache::new(counting_update(Arc::clone(&calls), None)));

        assert_eq!(cache.get_sync((), &"a"), None);

        // The background refresh runs on this runtime; yield until it lands.
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if cache.get_sync((), &"a").is_some() {
                return;
            }
        }
        panic!("background refresh never populated the cache");
    }

    #[tokio::test]
    async fn clear_resets_to_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ExpiringCache::new(counting_update(Arc::clone(&calls), None));

        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
        cache.clear();
        assert_eq!(cache.get((), &"a").await.unwrap(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
