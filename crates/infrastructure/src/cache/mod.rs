//! 缓存实现
//!
//! 缓存永远不是权威数据源，出错降级为未命中并记警告日志，
//! 不向调用方传播（尽力而为旁路）。

mod memory;
mod redis_cache;

pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;

use std::sync::Arc;

use tracing::info;

use shopd_core::config::{CacheBackend, CacheConfig};
use shopd_core::traits::CacheStore;
use shopd_core::ShopResult;

/// 按配置创建缓存实例
pub struct CacheFactory;

impl CacheFactory {
    pub async fn create(config: &CacheConfig) -> ShopResult<Arc<dyn CacheStore>> {
        match config.backend {
            CacheBackend::Redis => {
                info!("使用Redis缓存");
                Ok(Arc::new(RedisCache::connect(&config.url).await?))
            }
            CacheBackend::Memory => {
                info!("使用内存缓存（嵌入式模式）");
                Ok(Arc::new(InMemoryCache::new()))
            }
        }
    }
}
