//! Cache invalidation hook.
//!
//! The listing endpoints that read issues cache their responses under
//! `issues:*` and `issues-count:*` keys. The worker never reads that cache;
//! it only drops those keys after refreshing tags so the next listing is
//! recomputed.

use async_trait::async_trait;
use thiserror::Error;

/// Key patterns holding cached issue listings.
pub const ISSUE_CACHE_PATTERNS: [&str; 2] = ["issues:*", "issues-count:*"];

/// Keys requested per SCAN round trip.
#[cfg(feature = "redis")]
const SCAN_BATCH: usize = 100;

#[derive(Debug, Error)]
pub enum CacheError {
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache unavailable: {message}")]
    Unavailable { message: String },
}

/// Removes cached entries whose keys match glob-style patterns.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Delete every key matching any of `patterns`. Returns the number of
    /// keys removed.
    async fn invalidate(&self, patterns: &[&str]) -> Result<u64, CacheError>;
}

/// Invalidator for deployments without a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, patterns: &[&str]) -> Result<u64, CacheError> {
        tracing::debug!(?patterns, "No cache configured, skipping invalidation");
        Ok(0)
    }
}

/// Redis-backed invalidator using `SCAN` + `UNLINK`.
#[cfg(feature = "redis")]
#[derive(Debug, Clone)]
pub struct RedisInvalidator {
    client: redis::Client,
}

#[cfg(feature = "redis")]
impl RedisInvalidator {
    /// Build an invalidator for `redis_url`. No connection is made until
    /// the first invalidation.
    pub fn open(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl CacheInvalidator for RedisInvalidator {
    async fn invalidate(&self, patterns: &[&str]) -> Result<u64, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut removed = 0u64;

        for pattern in patterns {
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(*pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                if !keys.is_empty() {
                    let unlinked: u64 = redis::cmd("UNLINK")
                        .arg(&keys)
                        .query_async(&mut conn)
                        .await?;
                    removed += unlinked;
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }
            tracing::debug!(pattern, removed, "Invalidated cache pattern");
        }

        Ok(removed)
    }
}
