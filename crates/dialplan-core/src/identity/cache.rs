//! Caller profile cache

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::{CallerProfile, Result};

/// Outcome of a cache read. Transport errors are reported separately from
/// misses so they can be logged, but callers treat both the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CallerProfile),
    Miss,
    Error(String),
}

/// Lookaside cache keyed by canonical caller number
#[async_trait]
pub trait IdentityCache: Send + Sync {
    async fn get(&self, phone_number: &str) -> CacheLookup;

    /// Store a profile for the configured TTL
    async fn set(&self, phone_number: &str, profile: &CallerProfile) -> Result<()>;

    async fn invalidate(&self, phone_number: &str) -> Result<()>;
}

/// Cache key for a canonical phone number
pub fn cache_key(phone_number: &str) -> String {
    format!("user:phone:{}", phone_number)
}

/// In-process cache built on moka with a fixed time-to-live
#[derive(Clone)]
pub struct MokaIdentityCache {
    inner: Cache<String, CallerProfile>,
    ttl: Duration,
}

impl MokaIdentityCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, ttl }
    }
}

#[async_trait]
impl IdentityCache for MokaIdentityCache {
    async fn get(&self, phone_number: &str) -> CacheLookup {
        match self.inner.get(&cache_key(phone_number)).await {
            Some(profile) => CacheLookup::Hit(profile),
            None => CacheLookup::Miss,
        }
    }

    async fn set(&self, phone_number: &str, profile: &CallerProfile) -> Result<()> {
        self.inner.insert(cache_key(phone_number), profile.clone()).await;
        debug!(phone = %phone_number, ttl_secs = self.ttl.as_secs(), "caller profile cached");
        Ok(())
    }

    async fn invalidate(&self, phone_number: &str) -> Result<()> {
        self.inner.invalidate(&cache_key(phone_number)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CallerProfile {
        CallerProfile {
            id: "user-1".to_string(),
            display_name: Some("Ayse".to_string()),
            tenant_id: "acme".to_string(),
            user_type: "customer".to_string(),
            contacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = MokaIdentityCache::new(Duration::from_secs(60), 100);
        assert_eq!(cache.get("905551234567").await, CacheLookup::Miss);

        cache.set("905551234567", &profile()).await.unwrap();
        assert_eq!(cache.get("905551234567").await, CacheLookup::Hit(profile()));

        cache.invalidate("905551234567").await.unwrap();
        assert_eq!(cache.get("905551234567").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MokaIdentityCache::new(Duration::from_millis(50), 100);
        cache.set("905551234567", &profile()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("905551234567").await, CacheLookup::Miss);
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("905551234567"), "user:phone:905551234567");
    }
}
