//! 任务处理器
//!
//! 每个处理器是纯函数式的叶子任务：`(上下文, 载荷) -> 副作用 + 结果摘要`。
//! 处理器抛出的错误不会传播到任务生产者，只会进入重试/丢弃路径。

pub mod email_tasks;
pub mod maintenance_tasks;
pub mod notification_tasks;
pub mod order_tasks;
pub mod senders;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use shopd_core::ShopResult;

use crate::context::TaskContext;

/// 任务处理器接口
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 任务名，与路由表中的名字一致
    fn name(&self) -> &'static str;

    /// 执行任务，返回结果摘要
    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value>;
}

/// 按任务名索引的处理器注册表
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    /// 注册全部内置任务处理器
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(order_tasks::ProcessNewOrderHandler));
        registry.register(Arc::new(order_tasks::CancelUnpaidOrdersHandler));
        registry.register(Arc::new(order_tasks::OrderStatusUpdatedHandler));
        registry.register(Arc::new(email_tasks::SendOrderConfirmationHandler));
        registry.register(Arc::new(email_tasks::SendOrderCancelledHandler));
        registry.register(Arc::new(email_tasks::SendWelcomeEmailHandler));
        registry.register(Arc::new(notification_tasks::NotifyShopOwnerHandler));
        registry.register(Arc::new(notification_tasks::SendSmsHandler));
        registry.register(Arc::new(notification_tasks::SendTelegramMessageHandler));
        registry.register(Arc::new(maintenance_tasks::CleanupOldCartsHandler));
        registry.register(Arc::new(maintenance_tasks::UpdateProductStatisticsHandler));
        registry.register(Arc::new(maintenance_tasks::SalesReportHandler::daily()));
        registry.register(Arc::new(maintenance_tasks::SalesReportHandler::weekly()));
        registry.register(Arc::new(maintenance_tasks::SalesReportHandler::monthly()));
        registry.register(Arc::new(maintenance_tasks::SalesReportHandler::generic()));
        registry.register(Arc::new(maintenance_tasks::BackupDatabaseHandler));
        registry.register(Arc::new(maintenance_tasks::ReindexSearchHandler));
        registry.register(Arc::new(maintenance_tasks::SystemHealthCheckHandler));
        registry
    }
}

/// 解析任务载荷
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> ShopResult<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| shopd_core::ShopError::Serialization(format!("解析任务载荷失败: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopd_core::models::tasks;

    #[test]
    fn test_standard_registry_covers_routed_tasks() {
        let registry = HandlerRegistry::standard();
        for name in [
            tasks::PROCESS_NEW_ORDER,
            tasks::SEND_ORDER_CONFIRMATION,
            tasks::SEND_ORDER_CANCELLED,
            tasks::SEND_WELCOME_EMAIL,
            tasks::NOTIFY_SHOP_OWNER,
            tasks::SEND_SMS,
            tasks::SEND_TELEGRAM_MESSAGE,
            tasks::ORDER_STATUS_UPDATED,
            tasks::CANCEL_UNPAID_ORDERS,
            tasks::CLEANUP_OLD_CARTS,
            tasks::UPDATE_PRODUCT_STATISTICS,
            tasks::GENERATE_DAILY_SALES_REPORT,
            tasks::GENERATE_WEEKLY_ANALYTICS,
            tasks::GENERATE_MONTHLY_REPORT,
            tasks::GENERATE_SALES_REPORT,
            tasks::BACKUP_DATABASE,
            tasks::REINDEX_SEARCH,
            tasks::SYSTEM_HEALTH_CHECK,
        ] {
            assert!(registry.get(name).is_some(), "缺少处理器: {name}");
        }
    }
}
