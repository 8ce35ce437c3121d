//! Page response cache
//!
//! Rendered page payloads are cached as JSON under keys derived from the
//! route and its canonicalized query parameters, suffixed with the cache
//! generation. Clearing bumps the generation, so a page computed from data
//! read before the clear lands under a key no reader asks for.
//!
//! Cache failures never reach the client: a failed read falls through to
//! the store, a failed write is logged and dropped.

mod redis_cache;

pub use redis_cache::{RedisPageCache, SharedRedis};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics::PAGE_CACHE_EVENTS;

/// Cache schema version, bump when the payload shape changes
pub const CACHE_VERSION: u32 = 1;

/// Derive the cache key for a page.
///
/// Parameters are sorted by name, values are percent-encoded and absent
/// values are dropped, so equivalent requests share one key regardless of
/// query-string order.
/// Format: `v1:page:{route}[:{name}={value}]*`
pub fn page_cache_key(route: &str, params: &[(&str, Option<&str>)]) -> String {
    let canonical: BTreeMap<&str, &str> = params
        .iter()
        .filter_map(|(name, value)| value.map(|v| (*name, v)))
        .collect();

    let mut key = format!("v{}:page:{}", CACHE_VERSION, route);
    for (name, value) in canonical {
        key.push(':');
        key.push_str(name);
        key.push('=');
        key.push_str(&urlencoding::encode(value));
    }
    key
}

/// Pattern matching every page key of the current version
pub fn page_key_pattern() -> String {
    format!("v{}:page:*", CACHE_VERSION)
}

/// Where the current cache generation is kept, outside the page pattern
pub fn generation_key() -> String {
    format!("v{}:page-generation", CACHE_VERSION)
}

/// `key` scoped to one cache generation
pub fn generational_key(key: &str, generation: u64) -> String {
    format!("{}@g{}", key, generation)
}

#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> Result<()>;

    /// Current generation, advanced by every `clear_pages`
    async fn generation(&self) -> Result<u64>;

    /// Advance the generation and drop every cached page. Returns how many
    /// keys were removed.
    async fn clear_pages(&self) -> Result<usize>;
}

/// Cache used when caching is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPageCache;

#[async_trait]
impl PageCache for NoopPageCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn generation(&self) -> Result<u64> {
        Ok(0)
    }

    async fn clear_pages(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Process-local cache without expiry, for tests and single-node setups
#[derive(Debug, Default)]
pub struct MemoryPageCache {
    entries: Mutex<HashMap<String, Value>>,
    generation: AtomicU64,
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value, _ttl_secs: u64) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn generation(&self) -> Result<u64> {
        Ok(self.generation.load(Ordering::SeqCst))
    }

    async fn clear_pages(&self) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

/// Serve `key` from the cache or compute, store and return it.
///
/// The entry is stored under the generation read before `compute` ran. If
/// the cache was cleared meanwhile, the result is still returned but never
/// served again. Errors from `compute` propagate and are never cached.
pub async fn get_or_compute<F, Fut>(
    cache: &dyn PageCache,
    route: &str,
    key: &str,
    ttl_secs: u64,
    compute: F,
) -> Result<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let key = match cache.generation().await {
        Ok(generation) => generational_key(key, generation),
        Err(e) => {
            warn!(key = %key, error = %e, "Page cache unavailable, bypassing");
            PAGE_CACHE_EVENTS.with_label_values(&[route, "error"]).inc();
            return compute().await;
        }
    };

    match cache.get(&key).await {
        Ok(Some(value)) => {
            debug!(key = %key, "Page cache hit");
            PAGE_CACHE_EVENTS.with_label_values(&[route, "hit"]).inc();
            return Ok(value);
        }
        Ok(None) => {
            debug!(key = %key, "Page cache miss");
            PAGE_CACHE_EVENTS.with_label_values(&[route, "miss"]).inc();
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Page cache read failed, bypassing");
            PAGE_CACHE_EVENTS.with_label_values(&[route, "error"]).inc();
        }
    }

    let value = compute().await?;

    if let Err(e) = cache.set(&key, &value, ttl_secs).await {
        warn!(key = %key, error = %e, "Page cache write failed");
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_key_is_order_independent() {
        let a = page_cache_key("q", &[("q", Some("car")), ("page", Some("2"))]);
        let b = page_cache_key("q", &[("page", Some("2")), ("q", Some("car"))]);
        assert_eq!(a, b);
        assert_eq!(a, "v1:page:q:page=2:q=car");
    }

    #[test]
    fn test_key_encodes_and_drops_missing() {
        let key = page_cache_key("q", &[("q", Some("a b:c")), ("size", None)]);
        assert_eq!(key, "v1:page:q:q=a%20b%3Ac");
        assert_ne!(
            page_cache_key("c", &[("slug", Some("car"))]),
            page_cache_key("c", &[("slug", Some("cars"))])
        );
    }

    struct FailingCache;

    #[async_trait]
    impl PageCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(AppError::Cache("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &Value, _ttl: u64) -> Result<()> {
            Err(AppError::Cache("connection refused".into()))
        }
        async fn generation(&self) -> Result<u64> {
            Err(AppError::Cache("connection refused".into()))
        }
        async fn clear_pages(&self) -> Result<usize> {
            Err(AppError::Cache("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_cache_failure_is_bypassed() {
        let value = get_or_compute(&FailingCache, "index", "k", 10, || async {
            Ok(json!({"ok": true}))
        })
        .await
        .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = MemoryPageCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = get_or_compute(&cache, "index", "k", 10, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!([1, 2]))
            })
            .await
            .unwrap();
            assert_eq!(value, json!([1, 2]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = MemoryPageCache::new();
        let result = get_or_compute(&cache, "article", "k", 10, || async {
            Err(AppError::NotFound("article".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_page_computed_across_a_clear_is_not_served() {
        let cache = MemoryPageCache::new();

        // a write lands while this page is being assembled
        let value = get_or_compute(&cache, "index", "k", 10, || async {
            cache.clear_pages().await.unwrap();
            Ok(json!("stale"))
        })
        .await
        .unwrap();
        assert_eq!(value, json!("stale"));

        let value = get_or_compute(&cache, "index", "k", 10, || async { Ok(json!("fresh")) })
            .await
            .unwrap();
        assert_eq!(value, json!("fresh"));

        let value = get_or_compute(&cache, "index", "k", 10, || async { Ok(json!("again")) })
            .await
            .unwrap();
        assert_eq!(value, json!("fresh"));
    }

    #[test]
    fn test_generational_key_stays_in_page_pattern() {
        let key = generational_key(&page_cache_key("q", &[("q", Some("car"))]), 7);
        assert_eq!(key, "v1:page:q:q=car@g7");
        assert!(key.starts_with(page_key_pattern().trim_end_matches('*')));
        assert!(!generation_key().starts_with(page_key_pattern().trim_end_matches('*')));
    }
}
