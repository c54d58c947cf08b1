//! Deduplicating async summary cache.
//!
//! A bounded LRU store of finished summaries plus a table of in-flight
//! computations. The first caller to miss on a key claims it and runs the
//! computation; concurrent callers for the same key wait on a `watch`
//! channel and receive the same outcome, success or error.
//!
//! The claim is released by a drop guard, so a claiming caller that is
//! cancelled (for example by a timeout) leaves no entry behind. Callers that
//! were waiting on it start over and one of them claims the key afresh.
//!
//! Lock order is always `inflight` then `store`. Neither lock is held across
//! an await.

mod key;

pub use key::CacheKey;

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::errors::SummarizeError;

/// Default number of stored summaries.
pub const DEFAULT_MAXSIZE: usize = 100;

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Served from the store.
    pub hits: u64,
    /// Claimed a key and ran the computation.
    pub misses: u64,
    /// Joined another caller's in-flight computation.
    pub coalesced: u64,
}

/// `None` until the claiming caller finishes.
type Outcome<E> = Option<Result<String, E>>;

struct Flight<E> {
    id: u64,
    outcome: watch::Receiver<Outcome<E>>,
}

enum Claim<E> {
    Stored(String),
    Join(watch::Receiver<Outcome<E>>),
    Owner(u64, watch::Sender<Outcome<E>>),
}

/// Removes the in-flight entry for `key` when dropped, unless another
/// claim has replaced it.
struct FlightGuard<'a, E> {
    inflight: &'a Mutex<HashMap<CacheKey, Flight<E>>>,
    key: &'a CacheKey,
    id: u64,
}

impl<E> Drop for FlightGuard<'_, E> {
    fn drop(&mut self) {
        let mut inflight = lock(self.inflight);
        if inflight.get(self.key).is_some_and(|f| f.id == self.id) {
            inflight.remove(self.key);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // nothing panics while holding these locks
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SummaryCache<E = SummarizeError> {
    store: Mutex<LruCache<CacheKey, String>>,
    inflight: Mutex<HashMap<CacheKey, Flight<E>>>,
    next_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl<E> std::fmt::Debug for SummaryCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryCache")
            .field("stats", &self.stats())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl<E> Default for SummaryCache<E> {
    fn default() -> Self {
        Self::new(DEFAULT_MAXSIZE)
    }
}

impl<E> SummaryCache<E> {
    /// A `maxsize` of zero is treated as one.
    pub fn new(maxsize: usize) -> Self {
        let capacity = NonZeroUsize::new(maxsize).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Return the stored value for `key`, or run `compute` and store its
    /// result.
    ///
    /// At most one computation per key is in flight at a time. Callers that
    /// arrive while it runs get its result, including its error, without
    /// calling `compute` themselves. A failed computation stores nothing, so
    /// the next call after it settles computes again.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Clone,
    {
        loop {
            match self.claim(&key) {
                Claim::Stored(value) => return Ok(value),
                Claim::Join(mut outcome) => {
                    let settled = outcome
                        .wait_for(Option::is_some)
                        .await
                        .map(|settled| settled.clone());
                    match settled {
                        Ok(Some(result)) => return result,
                        // the claiming caller was cancelled
                        _ => debug!(key = %key, "In-flight summary abandoned, retrying"),
                    }
                }
                Claim::Owner(id, sender) => {
                    let _guard = FlightGuard {
                        inflight: &self.inflight,
                        key: &key,
                        id,
                    };
                    let result = compute().await;
                    if let Ok(value) = &result {
                        lock(&self.store).put(key.clone(), value.clone());
                    }
                    sender.send_replace(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    fn claim(&self, key: &CacheKey) -> Claim<E> {
        let mut inflight = lock(&self.inflight);
        if let Some(value) = lock(&self.store).get(key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Summary cache hit");
            return Claim::Stored(value);
        }
        if let Some(flight) = inflight.get(key) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Joining in-flight summary");
            return Claim::Join(flight.outcome.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Summary cache miss");
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, outcome) = watch::channel(None);
        inflight.insert(key.clone(), Flight { id, outcome });
        Claim::Owner(id, sender)
    }

    /// Number of keys with a computation currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }

    /// Look up a stored value. Counts as a use for recency.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        lock(&self.store).get(key).cloned()
    }

    /// Whether a value is stored, without touching recency.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.store).contains(key)
    }

    pub async fn len(&self) -> usize {
        lock(&self.store).len()
    }

    pub async fn is_empty(&self) -> bool {
        lock(&self.store).is_empty()
    }

    pub async fn capacity(&self) -> usize {
        lock(&self.store).cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(s: &str) -> CacheKey {
        CacheKey::from_texts("ctx", s)
    }

    async fn fill(cache: &SummaryCache<()>, k: &str) {
        let value = format!("summary of {}", k);
        let _: Result<String, ()> = cache.get_or_compute(key(k), || async { Ok(value) }).await;
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_store() {
        let cache = SummaryCache::new(10);
        let calls = AtomicUsize::new(0);

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>("first".to_string())
        };
        let a = cache.get_or_compute(key("k"), compute).await.unwrap();
        let b = cache
            .get_or_compute(key("k"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>("second".to_string())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, "first");
        assert_eq!(b, "first");
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                coalesced: 0
            }
        );
    }

    #[tokio::test]
    async fn test_lru_eviction_by_access() {
        let cache = SummaryCache::new(2);
        fill(&cache, "A").await;
        fill(&cache, "B").await;
        assert_eq!(cache.get(&key("A")).await.as_deref(), Some("summary of A"));
        fill(&cache, "C").await;

        assert!(cache.contains(&key("A")).await);
        assert!(!cache.contains(&key("B")).await);
        assert!(cache.contains(&key("C")).await);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_maxsize_plus_one_evicts_least_recent() {
        let cache = SummaryCache::new(3);
        for k in ["a", "b", "c"] {
            fill(&cache, k).await;
        }
        // touch "a" through a hit so "b" becomes least recent
        fill(&cache, "a").await;
        fill(&cache, "d").await;

        assert!(!cache.contains(&key("b")).await);
        for k in ["a", "c", "d"] {
            assert!(cache.contains(&key(k)).await, "{} should remain", k);
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_poison() {
        let cache = SummaryCache::new(4);
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_compute(key("k"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>("rate limited")
            })
            .await
            .unwrap_err();
        assert_eq!(err, "rate limited");
        assert!(!cache.contains(&key("k")).await);
        assert!(cache.is_empty().await);

        let ok = cache
            .get_or_compute(key("k"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>("done".to_string())
            })
            .await
            .unwrap();
        assert_eq!(ok, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_computation() {
        let cache = SummaryCache::new(4);
        let calls = AtomicUsize::new(0);

        let requests = (0..8).map(|_| {
            cache.get_or_compute(key("same"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, ()>("shared".to_string())
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("shared")));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced, 7);
    }

    #[tokio::test]
    async fn test_concurrent_spawned_tasks_share_one_computation() {
        let cache = Arc::new(SummaryCache::new(4));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key("spawned"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ()>("value".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("value".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_independently() {
        let cache = SummaryCache::new(4);
        let calls = AtomicUsize::new(0);
        for k in ["x", "y"] {
            cache
                .get_or_compute(key(k), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(k.to_string())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(&key("y")).await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_zero_maxsize_is_clamped() {
        let cache = SummaryCache::<()>::new(0);
        assert_eq!(cache.capacity().await, 1);
        assert_eq!(SummaryCache::<()>::default().capacity().await, DEFAULT_MAXSIZE);
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_call_and_error() {
        let cache = SummaryCache::new(4);
        let calls = AtomicUsize::new(0);

        let requests = (0..8).map(|_| {
            cache.get_or_compute(key("failing"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<String, _>("rate limited")
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| *r == Err("rate limited")));
        assert_eq!(cache.stats().coalesced, 7);
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_staggered_callers_never_overlap_after_failure() {
        let cache = Arc::new(SummaryCache::new(4));
        let attempts = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let cache = Arc::clone(&cache);
            let attempts = Arc::clone(&attempts);
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key("flaky"), || async move {
                        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_running.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(40)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        if attempt == 0 {
                            Err("first attempt fails")
                        } else {
                            Ok("recovered".to_string())
                        }
                    })
                    .await
            }));
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        assert!(attempts.load(Ordering::SeqCst) <= 2);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_requests_leave_nothing_in_flight() {
        let cache = SummaryCache::new(64);

        for i in 0..50 {
            let request = cache.get_or_compute(key(&format!("slow {}", i)), || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ()>("never".to_string())
            });
            let timed_out = tokio::time::timeout(Duration::from_millis(5), request).await;
            assert!(timed_out.is_err());
        }

        assert_eq!(cache.in_flight(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_waiter_takes_over_when_owner_is_cancelled() {
        let cache = SummaryCache::new(4);
        let calls = AtomicUsize::new(0);

        let owner = cache.get_or_compute(key("handoff"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ()>("owner".to_string())
        });
        let waiter = async {
            // let the owner claim the key first
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache
                .get_or_compute(key("handoff"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>("waiter".to_string())
                })
                .await
        };
        let cancelled_owner = async move {
            let _ = tokio::time::timeout(Duration::from_millis(30), owner).await;
        };

        let ((), result) = tokio::join!(cancelled_owner, waiter);

        assert_eq!(result, Ok("waiter".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().coalesced, 1);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.get(&key("handoff")).await.as_deref(), Some("waiter"));
    }
}
