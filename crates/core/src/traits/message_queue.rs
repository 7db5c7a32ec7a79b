use async_trait::async_trait;

use crate::errors::ShopResult;
use crate::models::TaskMessage;

/// 消息队列抽象接口
///
/// 投递语义为至少一次：消息在 `ack_message` 之前不会从队列移除，
/// worker崩溃会导致重新投递，消费方必须幂等或容忍重复副作用。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息到指定队列
    async fn publish_message(&self, queue: &str, message: &TaskMessage) -> ShopResult<()>;

    /// 从指定队列消费消息（消费后处于未确认状态）
    async fn consume_messages(&self, queue: &str) -> ShopResult<Vec<TaskMessage>>;

    /// 确认消息处理完成
    async fn ack_message(&self, message_id: &str) -> ShopResult<()>;

    /// 拒绝消息，可选择重新入队
    async fn nack_message(&self, message_id: &str, requeue: bool) -> ShopResult<()>;

    /// 创建队列
    async fn create_queue(&self, queue: &str, durable: bool) -> ShopResult<()>;

    /// 清空队列
    async fn purge_queue(&self, queue: &str) -> ShopResult<()>;

    /// 获取队列中的消息数量
    async fn get_queue_size(&self, queue: &str) -> ShopResult<u32>;
}
