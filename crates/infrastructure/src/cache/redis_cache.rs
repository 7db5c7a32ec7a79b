use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use shopd_core::traits::CacheStore;
use shopd_core::{ShopError, ShopResult};

/// Redis缓存实现
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> ShopResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ShopError::Cache(format!("解析Redis地址失败: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ShopError::Cache(format!("连接Redis失败: {e}")))?;
        info!("成功连接到Redis: {url}");
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> ShopResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| ShopError::Cache(format!("GET {key} 失败: {e}")))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> ShopResult<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| ShopError::Cache(format!("SETEX {key} 失败: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShopResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| ShopError::Cache(format!("DEL {key} 失败: {e}")))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> ShopResult<()> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .map_err(|e| ShopError::Cache(format!("KEYS {pattern} 失败: {e}")))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| ShopError::Cache(format!("批量DEL失败: {e}")))?;
        }
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> ShopResult<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = conn
            .incr(key, delta)
            .await
            .map_err(|e| ShopError::Cache(format!("INCR {key} 失败: {e}")))?;
        Ok(value)
    }
}
