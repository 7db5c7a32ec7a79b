use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{
    options::*, BasicProperties, Channel, Connection, ConnectionProperties, Queue,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use shopd_core::config::MessageQueueConfig;
use shopd_core::models::{queues, TaskMessage};
use shopd_core::traits::MessageQueue;
use shopd_core::{ShopError, ShopResult};

/// RabbitMQ消息队列实现
///
/// 迟确认：basic_get 不自动确认，delivery_tag 以消息id为键暂存，
/// worker执行完成后调用 `ack_message` 才真正出队。
pub struct RabbitMqMessageQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    /// 未确认投递：消息id -> delivery_tag
    pending_tags: Arc<Mutex<HashMap<String, u64>>>,
}

impl RabbitMqMessageQueue {
    /// 连接RabbitMQ并声明全部业务队列
    pub async fn new(config: &MessageQueueConfig) -> ShopResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| ShopError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ShopError::MessageQueue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            pending_tags: Arc::new(Mutex::new(HashMap::new())),
        };
        queue.initialize_queues().await?;
        Ok(queue)
    }

    /// 声明五个业务队列；支持优先级的队列带 x-max-priority 参数
    async fn initialize_queues(&self) -> ShopResult<()> {
        let channel = self.channel.lock().await;
        for name in queues::ALL {
            let with_priority = queues::PRIORITY_QUEUES.contains(&name);
            Self::declare_queue(&channel, name, true, with_priority).await?;
        }
        info!("所有队列初始化完成");
        Ok(())
    }

    async fn declare_queue(
        channel: &Channel,
        queue_name: &str,
        durable: bool,
        with_priority: bool,
    ) -> ShopResult<Queue> {
        let mut arguments = FieldTable::default();
        if with_priority {
            arguments.insert("x-max-priority".into(), AMQPValue::LongInt(10));
        }
        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                arguments,
            )
            .await
            .map_err(|e| ShopError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}")))?;
        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    fn serialize_message(message: &TaskMessage) -> ShopResult<Vec<u8>> {
        message
            .serialize_bytes()
            .map_err(|e| ShopError::Serialization(format!("序列化任务消息失败: {e}")))
    }

    fn deserialize_message(data: &[u8]) -> ShopResult<TaskMessage> {
        TaskMessage::deserialize_bytes(data)
            .map_err(|e| ShopError::Serialization(format!("反序列化任务消息失败: {e}")))
    }

    fn is_not_found(error: &lapin::Error) -> bool {
        let text = error.to_string();
        text.contains("NOT_FOUND") || text.contains("404")
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 关闭连接
    pub async fn close(&self) -> ShopResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| ShopError::MessageQueue(format!("关闭连接失败: {e}")))?;
        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RabbitMqMessageQueue {
    async fn publish_message(&self, queue: &str, message: &TaskMessage) -> ShopResult<()> {
        let channel = self.channel.lock().await;
        let payload = Self::serialize_message(message)?;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // 持久化消息
                    .with_priority(message.priority),
            )
            .await
            .map_err(|e| ShopError::MessageQueue(format!("发布消息到队列 {queue} 失败: {e}")))?;
        confirm
            .await
            .map_err(|e| ShopError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!(queue, task = %message.task_name, "消息已发布");
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> ShopResult<Vec<TaskMessage>> {
        let channel = self.channel.lock().await;
        let get_result = channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await;

        match get_result {
            Ok(Some(delivery)) => {
                let message = Self::deserialize_message(&delivery.data)?;
                self.pending_tags
                    .lock()
                    .await
                    .insert(message.id.clone(), delivery.delivery_tag);
                Ok(vec![message])
            }
            Ok(None) => Ok(vec![]),
            Err(e) if Self::is_not_found(&e) => {
                debug!("队列 {} 不存在，返回空结果", queue);
                Ok(vec![])
            }
            Err(e) => Err(ShopError::MessageQueue(format!(
                "从队列 {queue} 获取消息失败: {e}"
            ))),
        }
    }

    async fn ack_message(&self, message_id: &str) -> ShopResult<()> {
        let tag = self.pending_tags.lock().await.remove(message_id);
        match tag {
            Some(tag) => {
                let channel = self.channel.lock().await;
                channel
                    .basic_ack(tag, BasicAckOptions::default())
                    .await
                    .map_err(|e| ShopError::MessageQueue(format!("确认消息失败: {e}")))?;
                debug!(message_id, "消息已确认");
                Ok(())
            }
            None => Err(ShopError::MessageQueue(format!(
                "未找到消息 {message_id} 的投递记录"
            ))),
        }
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> ShopResult<()> {
        let tag = self.pending_tags.lock().await.remove(message_id);
        match tag {
            Some(tag) => {
                let channel = self.channel.lock().await;
                channel
                    .basic_nack(
                        tag,
                        BasicNackOptions {
                            requeue,
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| ShopError::MessageQueue(format!("拒绝消息失败: {e}")))?;
                debug!(message_id, requeue, "消息已拒绝");
                Ok(())
            }
            None => Err(ShopError::MessageQueue(format!(
                "未找到消息 {message_id} 的投递记录"
            ))),
        }
    }

    async fn create_queue(&self, queue: &str, durable: bool) -> ShopResult<()> {
        let channel = self.channel.lock().await;
        Self::declare_queue(&channel, queue, durable, false).await?;
        Ok(())
    }

    async fn purge_queue(&self, queue: &str) -> ShopResult<()> {
        let channel = self.channel.lock().await;
        channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await
            .map_err(|e| ShopError::MessageQueue(format!("清空队列 {queue} 失败: {e}")))?;
        debug!("队列 {} 已清空", queue);
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> ShopResult<u32> {
        let channel = self.channel.lock().await;
        let queue_info = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;
        match queue_info {
            Ok(info) => Ok(info.message_count()),
            Err(e) if Self::is_not_found(&e) => Ok(0),
            Err(e) => Err(ShopError::MessageQueue(format!(
                "获取队列 {queue} 信息失败: {e}"
            ))),
        }
    }
}
