use async_trait::async_trait;

use crate::errors::ShopResult;

/// 键值缓存抽象接口
///
/// 缓存不是权威数据源：写路径上的任何判断（特别是库存检查）只读
/// 关系型存储。实体的每次写入都要主动失效对应的缓存键。
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> ShopResult<Option<String>>;

    /// 写入并设置TTL（秒）
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> ShopResult<()>;

    async fn delete(&self, key: &str) -> ShopResult<()>;

    /// 按前缀批量删除
    async fn delete_prefix(&self, prefix: &str) -> ShopResult<()>;

    /// 计数器自增
    async fn incr(&self, key: &str, delta: i64) -> ShopResult<i64>;
}

/// 缓存键的命名约定
pub mod keys {
    pub fn product(id: i64) -> String {
        format!("product:{id}")
    }

    pub fn product_prefix(tenant_id: i64) -> String {
        format!("products:tenant:{tenant_id}:")
    }

    pub fn order(id: i64) -> String {
        format!("order:{id}")
    }

    pub fn tenant_stats(tenant_id: i64) -> String {
        format!("stats:tenant:{tenant_id}")
    }
}
