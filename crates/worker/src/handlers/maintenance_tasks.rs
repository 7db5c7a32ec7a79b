use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use shopd_core::models::tasks;
use shopd_core::traits::{
    cache_keys, CacheStore, CartRepository, OrderRepository, ProductRepository, TenantRepository,
};
use shopd_core::ShopResult;

use crate::context::TaskContext;
use crate::handlers::TaskHandler;

/// 废弃购物车的保留时长
pub const STALE_CART_MAX_AGE_DAYS: i64 = 7;

/// 清理长期未更新的购物车
pub struct CleanupOldCartsHandler;

#[async_trait]
impl TaskHandler for CleanupOldCartsHandler {
    fn name(&self) -> &'static str {
        tasks::CLEANUP_OLD_CARTS
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let cutoff = Utc::now() - Duration::days(STALE_CART_MAX_AGE_DAYS);
        let deleted = ctx.cart_repo.delete_older_than(cutoff).await?;
        info!(deleted, "废弃购物车清理完成");
        Ok(json!({ "deleted_carts": deleted }))
    }
}

/// 刷新各租户的商品统计缓存
pub struct UpdateProductStatisticsHandler;

#[async_trait]
impl TaskHandler for UpdateProductStatisticsHandler {
    fn name(&self) -> &'static str {
        tasks::UPDATE_PRODUCT_STATISTICS
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let tenant_ids = ctx.tenant_repo.list_ids().await?;
        let mut refreshed = 0u64;
        for tenant_id in tenant_ids {
            let stats = ctx.product_repo.tenant_stats(tenant_id).await?;
            let value = serde_json::to_string(&stats).map_err(|e| {
                shopd_core::ShopError::Serialization(format!("序列化商品统计失败: {e}"))
            })?;
            if let Err(e) = ctx
                .cache
                .set(&cache_keys::tenant_stats(tenant_id), &value, ctx.cache_ttl_seconds)
                .await
            {
                warn!(tenant_id, error = %e, "写入统计缓存失败");
                continue;
            }
            refreshed += 1;
        }
        Ok(json!({ "tenants": refreshed }))
    }
}

/// 销售报表：统计时间窗口内的订单量与营收并记录
pub struct SalesReportHandler {
    task_name: &'static str,
    window_days: i64,
}

impl SalesReportHandler {
    pub fn daily() -> Self {
        Self {
            task_name: tasks::GENERATE_DAILY_SALES_REPORT,
            window_days: 1,
        }
    }

    pub fn weekly() -> Self {
        Self {
            task_name: tasks::GENERATE_WEEKLY_ANALYTICS,
            window_days: 7,
        }
    }

    pub fn monthly() -> Self {
        Self {
            task_name: tasks::GENERATE_MONTHLY_REPORT,
            window_days: 30,
        }
    }

    pub fn generic() -> Self {
        Self {
            task_name: tasks::GENERATE_SALES_REPORT,
            window_days: 1,
        }
    }
}

#[async_trait]
impl TaskHandler for SalesReportHandler {
    fn name(&self) -> &'static str {
        self.task_name
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let to = Utc::now();
        let from = to - Duration::days(self.window_days);
        let summary = ctx.order_repo.sales_summary(from, to).await?;
        info!(
            task = self.task_name,
            window_days = self.window_days,
            orders = summary.order_count,
            revenue = summary.total_revenue,
            "销售报表生成完成"
        );
        Ok(json!({
            "window_days": self.window_days,
            "orders": summary.order_count,
            "revenue": summary.total_revenue,
        }))
    }
}

/// 数据库备份占位任务：真正的备份由部署环境提供
pub struct BackupDatabaseHandler;

#[async_trait]
impl TaskHandler for BackupDatabaseHandler {
    fn name(&self) -> &'static str {
        tasks::BACKUP_DATABASE
    }

    async fn handle(&self, _ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let backup_file = format!("db_backup_{}.sql.gz", Utc::now().format("%Y%m%d_%H%M%S"));
        info!(backup_file, "触发数据库备份");
        Ok(json!({ "backup_file": backup_file, "status": "completed" }))
    }
}

/// 搜索索引重建占位任务：索引由外部搜索引擎维护
pub struct ReindexSearchHandler;

#[async_trait]
impl TaskHandler for ReindexSearchHandler {
    fn name(&self) -> &'static str {
        tasks::REINDEX_SEARCH
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let products = ctx.product_repo.count(None).await?;
        info!(products, "触发搜索索引重建");
        Ok(json!({ "status": "reindexed", "products": products }))
    }
}

/// 系统健康检查：数据库与缓存各探测一次
pub struct SystemHealthCheckHandler;

#[async_trait]
impl TaskHandler for SystemHealthCheckHandler {
    fn name(&self) -> &'static str {
        tasks::SYSTEM_HEALTH_CHECK
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let database_ok = ctx.product_repo.count(None).await.is_ok();

        let cache_ok = match ctx.cache.set("health:ping", "pong", 60).await {
            Ok(()) => matches!(
                ctx.cache.get("health:ping").await,
                Ok(Some(value)) if value == "pong"
            ),
            Err(_) => false,
        };

        if database_ok && cache_ok {
            info!("系统健康检查通过");
        } else {
            warn!(database_ok, cache_ok, "系统健康检查发现异常");
        }
        Ok(json!({ "database": database_ok, "cache": cache_ok }))
    }
}
