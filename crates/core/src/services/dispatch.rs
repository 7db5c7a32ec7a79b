//! 任务投递
//!
//! 把"尽力而为的旁路"契约显式化：入队失败永远只记日志，不向主
//! 操作的调用方传播，也绝不回滚主事务。需要感知失败的调用方使用
//! [`TaskDispatcher::try_dispatch`]。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::ShopResult;
use crate::models::TaskMessage;
use crate::traits::MessageQueue;

/// 任务投递器
#[derive(Clone)]
pub struct TaskDispatcher {
    queue: Arc<dyn MessageQueue>,
}

impl TaskDispatcher {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    /// 投递任务，失败时返回错误（Beat调度器等需要感知失败的场景）
    pub async fn try_dispatch(&self, message: &TaskMessage) -> ShopResult<()> {
        self.queue.publish_message(&message.queue, message).await?;
        debug!(
            task = %message.task_name,
            queue = %message.queue,
            message_id = %message.id,
            "任务已入队"
        );
        Ok(())
    }

    /// 尽力而为投递：失败只记警告日志，永不传播
    pub async fn dispatch(&self, message: TaskMessage) {
        if let Err(e) = self.try_dispatch(&message).await {
            warn!(
                task = %message.task_name,
                queue = %message.queue,
                error = %e,
                "任务入队失败，已忽略（尽力而为旁路）"
            );
        }
    }
}
