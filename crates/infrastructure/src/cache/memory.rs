use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use shopd_core::traits::CacheStore;
use shopd_core::ShopResult;

/// 内存缓存实现，测试和嵌入式模式用
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> ShopResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> ShopResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShopResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> ShopResult<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> ShopResult<i64> {
        let mut counters = self.counters.lock().unwrap();
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = InMemoryCache::new();
        cache.set("product:1", "a", 60).await.unwrap();
        cache.set("product:2", "b", 60).await.unwrap();
        cache.set("order:1", "c", 60).await.unwrap();
        cache.delete_prefix("product:").await.unwrap();
        assert_eq!(cache.get("product:1").await.unwrap(), None);
        assert_eq!(cache.get("product:2").await.unwrap(), None);
        assert_eq!(cache.get("order:1").await.unwrap(), Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_incr() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.incr("views", 1).await.unwrap(), 1);
        assert_eq!(cache.incr("views", 2).await.unwrap(), 3);
    }
}
