//! Caching of finished results.
//!
//! Anomaly maps for past years do not change, and Earth Engine computations take seconds to
//! minutes, so identical requests are answered from memory for a while.

use crate::metrics::CACHE_LOOKUPS;

use cached::{Cached, TimedSizedCache};
use std::future::Future;
use std::hash::Hash;
use tokio::sync::Mutex;

/// A size and time bounded map of results, keyed by request.
pub struct ResultCache<K, V> {
    name: &'static str,
    cache: Option<Mutex<TimedSizedCache<K, V>>>,
}

impl<K, V> ResultCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create a cache holding up to `size` results for `ttl` seconds each.
    ///
    /// A size of zero disables caching.
    pub fn new(name: &'static str, size: usize, ttl: u64) -> Self {
        let cache = if size == 0 {
            None
        } else {
            Some(Mutex::new(TimedSizedCache::with_size_and_lifespan(
                size, ttl,
            )))
        };
        Self { name, cache }
    }

    /// Return the cached value for `key`, or compute and cache it.
    ///
    /// Errors are not cached. The lock is not held while computing, so concurrent misses for the
    /// same key compute the value more than once.
    pub async fn get_or_try_insert<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(cache) = &self.cache else {
            return compute().await;
        };
        if let Some(value) = cache.lock().await.cache_get(&key).cloned() {
            CACHE_LOOKUPS.with_label_values(&[self.name, "hit"]).inc();
            return Ok(value);
        }
        CACHE_LOOKUPS.with_label_values(&[self.name, "miss"]).inc();
        let value = compute().await?;
        cache.lock().await.cache_set(key, value.clone());
        Ok(value)
    }
}
