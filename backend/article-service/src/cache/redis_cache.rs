use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{generation_key, page_key_pattern, PageCache};
use crate::error::Result;
use crate::metrics::PAGE_CACHE_WRITE_TOTAL;

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

/// Redis-backed page cache with TTL jitter
#[derive(Clone)]
pub struct RedisPageCache {
    redis: SharedRedis,
}

impl RedisPageCache {
    pub fn new(redis: SharedRedis) -> Self {
        Self { redis }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }

    /// Round trip used by the readiness route
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.lock().await;
        redis::cmd("PING").query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }

    /// Add up to 10% jitter so pages cached together do not expire together
    fn add_jitter(ttl_secs: u64) -> u64 {
        let jitter_percent = (rand::random::<u32>() % 10) as f64 / 100.0;
        let jitter = (ttl_secs as f64 * jitter_percent).round() as u64;
        ttl_secs + jitter
    }
}

#[async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.redis.lock().await;
        let data: Option<String> = conn.get(key).await?;

        match data {
            Some(data) => match serde_json::from_str::<Value>(&data) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached page is corrupted, dropping it");
                    let _ = conn.del::<_, ()>(key).await;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let ttl_with_jitter = Self::add_jitter(ttl_secs);

        let mut conn = self.redis.lock().await;
        if let Err(e) = conn.set_ex::<_, _, ()>(key, data, ttl_with_jitter).await {
            PAGE_CACHE_WRITE_TOTAL.with_label_values(&["error"]).inc();
            return Err(e.into());
        }

        debug!(key = %key, ttl = ttl_with_jitter, "Page cache set");
        PAGE_CACHE_WRITE_TOTAL.with_label_values(&["success"]).inc();
        Ok(())
    }

    async fn generation(&self) -> Result<u64> {
        let mut conn = self.redis.lock().await;
        let generation: Option<u64> = conn.get(generation_key()).await?;
        Ok(generation.unwrap_or(0))
    }

    /// Bumps the generation first; the SCAN only reclaims memory, older
    /// generations are unreachable from then on.
    async fn clear_pages(&self) -> Result<usize> {
        let pattern = page_key_pattern();
        let mut conn = self.redis.lock().await;
        let generation: u64 = conn.incr(generation_key(), 1u64).await?;
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await?;

            if !keys.is_empty() {
                let mut pipe = Pipeline::new();
                for key in &keys {
                    pipe.del(key);
                }
                pipe.query_async::<_, ()>(&mut *conn).await?;
                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(
            pattern = %pattern,
            generation,
            deleted = total_deleted,
            "Page cache cleared"
        );
        Ok(total_deleted)
    }
}
