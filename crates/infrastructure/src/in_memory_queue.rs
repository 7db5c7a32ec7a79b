use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use shopd_core::models::{queues, TaskMessage};
use shopd_core::traits::MessageQueue;
use shopd_core::{ShopError, ShopResult};

/// 内存消息队列实现
///
/// 用于测试和嵌入式部署。保持与RabbitMQ实现一致的至少一次/迟确认
/// 语义：消费把消息移入未确认表，ack移除，nack(requeue)放回队首，
/// 队内按优先级（高在前）排序。
#[derive(Default)]
pub struct InMemoryMessageQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<TaskMessage>>>>,
    /// 未确认投递：消息id -> (队列名, 消息)
    unacked: Arc<Mutex<HashMap<String, (String, TaskMessage)>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预先声明全部业务队列
    pub async fn with_standard_queues() -> Self {
        let queue = Self::new();
        let mut guard = queue.queues.lock().await;
        for name in queues::ALL {
            guard.entry(name.to_string()).or_default();
        }
        drop(guard);
        queue
    }

    /// 当前未确认的消息数（测试观察用）
    pub async fn unacked_count(&self) -> usize {
        self.unacked.lock().await.len()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish_message(&self, queue: &str, message: &TaskMessage) -> ShopResult<()> {
        let mut queues = self.queues.lock().await;
        let entries = queues.entry(queue.to_string()).or_default();
        // 按优先级插入，高优先级在前，同优先级保持FIFO
        let position = entries
            .iter()
            .position(|m| m.priority < message.priority)
            .unwrap_or(entries.len());
        entries.insert(position, message.clone());
        debug!(queue, task = %message.task_name, "消息已入内存队列");
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> ShopResult<Vec<TaskMessage>> {
        let mut queues = self.queues.lock().await;
        let Some(entries) = queues.get_mut(queue) else {
            return Ok(vec![]);
        };
        match entries.pop_front() {
            Some(message) => {
                self.unacked
                    .lock()
                    .await
                    .insert(message.id.clone(), (queue.to_string(), message.clone()));
                Ok(vec![message])
            }
            None => Ok(vec![]),
        }
    }

    async fn ack_message(&self, message_id: &str) -> ShopResult<()> {
        match self.unacked.lock().await.remove(message_id) {
            Some(_) => Ok(()),
            None => Err(ShopError::MessageQueue(format!(
                "未找到消息 {message_id} 的投递记录"
            ))),
        }
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> ShopResult<()> {
        let entry = self.unacked.lock().await.remove(message_id);
        match entry {
            Some((queue, message)) => {
                if requeue {
                    self.queues
                        .lock()
                        .await
                        .entry(queue)
                        .or_default()
                        .push_front(message);
                }
                Ok(())
            }
            None => Err(ShopError::MessageQueue(format!(
                "未找到消息 {message_id} 的投递记录"
            ))),
        }
    }

    async fn create_queue(&self, queue: &str, _durable: bool) -> ShopResult<()> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn purge_queue(&self, queue: &str) -> ShopResult<()> {
        if let Some(entries) = self.queues.lock().await.get_mut(queue) {
            entries.clear();
        }
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> ShopResult<u32> {
        Ok(self
            .queues
            .lock()
            .await
            .get(queue)
            .map(|q| q.len() as u32)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopd_core::models::tasks;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_consume_ack() {
        let queue = InMemoryMessageQueue::new();
        let msg = TaskMessage::new(tasks::SEND_SMS, json!({"phone": "+100", "message": "hi"}));
        queue.publish_message(&msg.queue, &msg).await.unwrap();
        assert_eq!(queue.get_queue_size(&msg.queue).await.unwrap(), 1);

        let consumed = queue.consume_messages(&msg.queue).await.unwrap();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].id, msg.id);
        // 迟确认：消费后仍处于未确认状态
        assert_eq!(queue.unacked_count().await, 1);

        queue.ack_message(&msg.id).await.unwrap();
        assert_eq!(queue.unacked_count().await, 0);
        assert_eq!(queue.get_queue_size(&msg.queue).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let queue = InMemoryMessageQueue::new();
        let low = TaskMessage::new(tasks::CLEANUP_OLD_CARTS, json!({}));
        let high = TaskMessage::new(tasks::CANCEL_UNPAID_ORDERS, json!({}));
        // 两个任务都路由到 low_priority 队列，优先级分别为2和3
        assert_eq!(low.queue, high.queue);
        queue.publish_message(&low.queue, &low).await.unwrap();
        queue.publish_message(&high.queue, &high).await.unwrap();

        let first = queue.consume_messages(&low.queue).await.unwrap();
        assert_eq!(first[0].task_name, tasks::CANCEL_UNPAID_ORDERS);
    }

    #[tokio::test]
    async fn test_nack_requeues_to_front() {
        let queue = InMemoryMessageQueue::new();
        let msg = TaskMessage::new(tasks::SEND_ORDER_CONFIRMATION, json!({"order_id": 1}));
        queue.publish_message(&msg.queue, &msg).await.unwrap();

        let consumed = queue.consume_messages(&msg.queue).await.unwrap();
        queue.nack_message(&consumed[0].id, true).await.unwrap();

        // 重新投递
        let redelivered = queue.consume_messages(&msg.queue).await.unwrap();
        assert_eq!(redelivered[0].id, msg.id);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops() {
        let queue = InMemoryMessageQueue::new();
        let msg = TaskMessage::new(tasks::SEND_SMS, json!({}));
        queue.publish_message(&msg.queue, &msg).await.unwrap();
        let consumed = queue.consume_messages(&msg.queue).await.unwrap();
        queue.nack_message(&consumed[0].id, false).await.unwrap();
        assert!(queue.consume_messages(&msg.queue).await.unwrap().is_empty());
    }
}
