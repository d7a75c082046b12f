//! Keyed TTL cache with single-flight loading.
//!
//! Concurrent callers asking for the same missing or expired key wait on one
//! load instead of each hitting the backing source.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

struct Entry<V> {
    loaded_at: Instant,
    value: V,
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<Entry<V>>>>;

pub struct TtlCache<K, V> {
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    /// Return the cached value for `key`, loading it when missing or expired.
    ///
    /// A failed load leaves the previous entry (if any) untouched; the next
    /// waiter retries the load.
    pub async fn get_or_load<F, Fut, E>(&self, key: &K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let value = load().await?;
        *guard = Some(Entry {
            loaded_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn caches_within_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_load(&"admins", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_reloads() {
        let cache: TtlCache<u8, u32> = TtlCache::new(Duration::ZERO);
        let loads = AtomicUsize::new(0);
        for _ in 0..2 {
            cache
                .get_or_load(&1, || async {
                    Ok::<_, ()>(loads.fetch_add(1, Ordering::SeqCst) as u32)
                })
                .await
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_load() {
        let cache = Arc::new(TtlCache::<u8, u32>::new(Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    cache
                        .get_or_load(&1, || async {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, ()>(99)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(99));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache: TtlCache<u8, u32> = TtlCache::new(Duration::from_secs(60));
        let first = cache.get_or_load(&1, || async { Err::<u32, _>("down") }).await;
        assert_eq!(first, Err("down"));
        let second = cache.get_or_load(&1, || async { Ok::<_, &str>(3) }).await;
        assert_eq!(second, Ok(3));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache: TtlCache<u8, u32> = TtlCache::new(Duration::from_secs(60));
        cache.get_or_load(&1, || async { Ok::<_, ()>(1) }).await.unwrap();
        cache.invalidate(&1);
        let v = cache.get_or_load(&1, || async { Ok::<_, ()>(2) }).await.unwrap();
        assert_eq!(v, 2);
    }
}
