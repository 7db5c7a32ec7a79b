use std::sync::Arc;

use tracing::info;

use shopd_core::config::{MessageQueueBackend, MessageQueueConfig};
use shopd_core::traits::MessageQueue;
use shopd_core::ShopResult;

use crate::in_memory_queue::InMemoryMessageQueue;
use crate::message_queue::RabbitMqMessageQueue;

/// 按配置创建消息队列实例
pub struct MessageQueueFactory;

impl MessageQueueFactory {
    pub async fn create(config: &MessageQueueConfig) -> ShopResult<Arc<dyn MessageQueue>> {
        match config.backend {
            MessageQueueBackend::Rabbitmq => {
                info!("使用RabbitMQ消息队列");
                Ok(Arc::new(RabbitMqMessageQueue::new(config).await?))
            }
            MessageQueueBackend::Memory => {
                info!("使用内存消息队列（嵌入式模式）");
                Ok(Arc::new(InMemoryMessageQueue::with_standard_queues().await))
            }
        }
    }
}
