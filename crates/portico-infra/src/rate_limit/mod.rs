//! Fixed-window request counters.
//!
//! `RateLimitStore` is the seam used by the HTTP rate-limit middleware. The in-memory
//! store shards its buckets behind tokio mutexes to reduce lock contention; a shared
//! backend can implement the same trait when running more than one instance.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_SHARD_COUNT: usize = 16;
const DEFAULT_MAX_BUCKETS: usize = 10_000;

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request against `key`.
    ///
    /// Returns the remaining allowance inside the current window, or the time until
    /// the window resets when `limit` has been reached.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<u32, Duration>;

    /// Same answer as [`hit`](Self::hit) without counting a request.
    async fn check(&self, key: &str, limit: u32) -> Result<u32, Duration>;
}

#[derive(Debug, Clone)]
struct RateLimitBucket {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl RateLimitBucket {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }
}

type Shard = Arc<Mutex<HashMap<String, RateLimitBucket>>>;

#[derive(Clone)]
pub struct InMemoryRateLimitStore {
    shards: Vec<Shard>,
    max_buckets_per_shard: usize,
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}

impl InMemoryRateLimitStore {
    pub fn new(shard_count: usize) -> Self {
        Self::with_capacity(shard_count, DEFAULT_MAX_BUCKETS)
    }

    /// `max_buckets` caps the total number of tracked keys across all shards.
    pub fn with_capacity(shard_count: usize, max_buckets: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();

        Self {
            shards,
            max_buckets_per_shard: (max_buckets / shard_count).max(1),
        }
    }

    fn shard_for(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    /// Drop buckets whose window has elapsed. Meant to run periodically.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| !bucket.is_expired(now));
            removed += before - buckets.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired rate limit buckets");
        }
    }

    fn evict(buckets: &mut HashMap<String, RateLimitBucket>, now: Instant, max: usize) {
        buckets.retain(|_, bucket| !bucket.is_expired(now));

        if buckets.len() >= max {
            let oldest = buckets
                .iter()
                .min_by_key(|(_, bucket)| bucket.window_start)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                tracing::debug!(key = %key, "Evicting oldest rate limit bucket");
                buckets.remove(&key);
            }
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<u32, Duration> {
        let now = Instant::now();
        let mut buckets = self.shard_for(key).lock().await;

        if !buckets.contains_key(key) && buckets.len() >= self.max_buckets_per_shard {
            Self::evict(&mut buckets, now, self.max_buckets_per_shard);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(now, window));

        if bucket.is_expired(now) {
            *bucket = RateLimitBucket::new(now, window);
        }

        if bucket.count >= limit {
            let elapsed = now.duration_since(bucket.window_start);
            return Err(bucket.window.saturating_sub(elapsed));
        }

        bucket.count += 1;
        Ok(limit - bucket.count)
    }

    async fn check(&self, key: &str, limit: u32) -> Result<u32, Duration> {
        let now = Instant::now();
        let buckets = self.shard_for(key).lock().await;

        match buckets.get(key) {
            Some(bucket) if !bucket.is_expired(now) => {
                if bucket.count >= limit {
                    let elapsed = now.duration_since(bucket.window_start);
                    Err(bucket.window.saturating_sub(elapsed))
                } else {
                    Ok(limit - bucket.count)
                }
            }
            _ => Ok(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_down_then_rejects() {
        let store = InMemoryRateLimitStore::new(4);
        let window = Duration::from_secs(60);

        assert_eq!(store.hit("ip:1.2.3.4", 3, window).await, Ok(2));
        assert_eq!(store.hit("ip:1.2.3.4", 3, window).await, Ok(1));
        assert_eq!(store.hit("ip:1.2.3.4", 3, window).await, Ok(0));

        let reset = store.hit("ip:1.2.3.4", 3, window).await.unwrap_err();
        assert!(reset <= window);
        assert!(reset > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn check_does_not_count() {
        let store = InMemoryRateLimitStore::default();
        let window = Duration::from_secs(60);

        assert_eq!(store.check("ip:5.6.7.8", 2).await, Ok(2));
        assert_eq!(store.check("ip:5.6.7.8", 2).await, Ok(2));
        assert_eq!(store.hit("ip:5.6.7.8", 2, window).await, Ok(1));
        assert_eq!(store.check("ip:5.6.7.8", 2).await, Ok(1));
        assert_eq!(store.hit("ip:5.6.7.8", 2, window).await, Ok(0));
        assert!(store.check("ip:5.6.7.8", 2).await.is_err());
        assert_eq!(store.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = InMemoryRateLimitStore::default();
        let window = Duration::from_secs(60);

        assert_eq!(store.hit("org:a", 1, window).await, Ok(0));
        assert!(store.hit("org:a", 1, window).await.is_err());
        assert_eq!(store.hit("org:b", 1, window).await, Ok(0));
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let store = InMemoryRateLimitStore::new(1);
        let window = Duration::from_millis(20);

        assert_eq!(store.hit("k", 1, window).await, Ok(0));
        assert!(store.hit("k", 1, window).await.is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.hit("k", 1, window).await, Ok(0));
    }

    #[tokio::test]
    async fn cleanup_drops_expired_buckets() {
        let store = InMemoryRateLimitStore::new(2);
        store.hit("a", 5, Duration::from_millis(10)).await.unwrap();
        store.hit("b", 5, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.cleanup_expired().await;

        assert_eq!(store.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn bucket_count_is_capped() {
        let store = InMemoryRateLimitStore::with_capacity(1, 3);
        let window = Duration::from_secs(60);

        for i in 0..10 {
            store.hit(&format!("ip:{i}"), 5, window).await.unwrap();
        }

        assert!(store.tracked_keys().await <= 3);
    }
}
