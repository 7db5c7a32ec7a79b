use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 队列名称
///
/// 五个队列构成生产者与Broker之间的运维契约，监控/告警按这些名字配置。
pub mod queues {
    pub const DEFAULT: &str = "default";
    pub const HIGH_PRIORITY: &str = "high_priority";
    pub const LOW_PRIORITY: &str = "low_priority";
    pub const EMAIL: &str = "email";
    pub const NOTIFICATIONS: &str = "notifications";

    pub const ALL: [&str; 5] = [DEFAULT, HIGH_PRIORITY, LOW_PRIORITY, EMAIL, NOTIFICATIONS];

    /// 支持按消息优先级排序的队列（声明时带 x-max-priority）
    pub const PRIORITY_QUEUES: [&str; 3] = [DEFAULT, HIGH_PRIORITY, LOW_PRIORITY];
}

/// 任务名称
///
/// 与队列路由表一样是对外契约的一部分，不可改名。
pub mod tasks {
    pub const PROCESS_NEW_ORDER: &str = "process_new_order";
    pub const SEND_ORDER_CONFIRMATION: &str = "send_order_confirmation";
    pub const SEND_ORDER_CANCELLED: &str = "send_order_cancelled";
    pub const SEND_WELCOME_EMAIL: &str = "send_welcome_email";
    pub const NOTIFY_SHOP_OWNER: &str = "notify_shop_owner";
    pub const SEND_SMS: &str = "send_sms";
    pub const SEND_TELEGRAM_MESSAGE: &str = "send_telegram_message";
    pub const ORDER_STATUS_UPDATED: &str = "order_status_updated";
    pub const CANCEL_UNPAID_ORDERS: &str = "cancel_unpaid_orders";
    pub const CLEANUP_OLD_CARTS: &str = "cleanup_old_carts";
    pub const UPDATE_PRODUCT_STATISTICS: &str = "update_product_statistics";
    pub const GENERATE_DAILY_SALES_REPORT: &str = "generate_daily_sales_report";
    pub const GENERATE_WEEKLY_ANALYTICS: &str = "generate_weekly_analytics";
    pub const GENERATE_MONTHLY_REPORT: &str = "generate_monthly_report";
    pub const GENERATE_SALES_REPORT: &str = "generate_sales_report";
    pub const BACKUP_DATABASE: &str = "backup_database";
    pub const REINDEX_SEARCH: &str = "reindex_search";
    pub const SYSTEM_HEALTH_CHECK: &str = "system_health_check";
}

/// 任务的静态路由：目标队列 + 队列内优先级（0-10）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRoute {
    pub queue: &'static str,
    pub priority: u8,
}

/// 任务名到队列/优先级的静态映射
///
/// 未在表中列出的任务进 default 队列，优先级5。
pub fn route_for(task_name: &str) -> TaskRoute {
    use queues::*;
    use tasks::*;
    match task_name {
        PROCESS_NEW_ORDER => TaskRoute { queue: HIGH_PRIORITY, priority: 10 },
        SEND_ORDER_CONFIRMATION => TaskRoute { queue: EMAIL, priority: 9 },
        SEND_ORDER_CANCELLED => TaskRoute { queue: EMAIL, priority: 8 },
        SEND_WELCOME_EMAIL => TaskRoute { queue: EMAIL, priority: 7 },
        NOTIFY_SHOP_OWNER => TaskRoute { queue: NOTIFICATIONS, priority: 9 },
        SEND_SMS => TaskRoute { queue: NOTIFICATIONS, priority: 8 },
        SEND_TELEGRAM_MESSAGE => TaskRoute { queue: NOTIFICATIONS, priority: 8 },
        CANCEL_UNPAID_ORDERS => TaskRoute { queue: LOW_PRIORITY, priority: 3 },
        CLEANUP_OLD_CARTS => TaskRoute { queue: LOW_PRIORITY, priority: 2 },
        GENERATE_SALES_REPORT
        | GENERATE_DAILY_SALES_REPORT
        | GENERATE_WEEKLY_ANALYTICS
        | GENERATE_MONTHLY_REPORT => TaskRoute { queue: LOW_PRIORITY, priority: 4 },
        BACKUP_DATABASE => TaskRoute { queue: LOW_PRIORITY, priority: 3 },
        _ => TaskRoute { queue: DEFAULT, priority: 5 },
    }
}

/// 异步任务消息
///
/// 瞬态工作单元，不做关系型持久化。投递语义为至少一次、
/// 迟确认（worker执行完成后才确认，中途崩溃会导致重新投递）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub task_name: String,
    pub payload: serde_json::Value,
    pub queue: String,
    pub priority: u8,
    pub retry_count: i32,
    pub enqueued_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

impl TaskMessage {
    /// 按路由表创建任务消息
    pub fn new(task_name: &str, payload: serde_json::Value) -> Self {
        let route = route_for(task_name);
        Self {
            id: Uuid::new_v4().to_string(),
            task_name: task_name.to_string(),
            payload,
            queue: route.queue.to_string(),
            priority: route.priority,
            retry_count: 0,
            enqueued_at: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// 派生一条重试消息：新的消息id，重试计数加一
    pub fn retry_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.retry_count += 1;
        copy.enqueued_at = Utc::now();
        copy
    }

    pub fn is_retry_exhausted(&self, max_retries: i32) -> bool {
        self.retry_count >= max_retries
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 订单相关任务载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTaskPayload {
    pub order_id: i64,
}

/// 欢迎邮件载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeEmailPayload {
    pub email: String,
    pub full_name: String,
}

/// 短信载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsPayload {
    pub phone: String,
    pub message: String,
}

/// 外部聊天消息载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub chat_id: String,
    pub message: String,
}

/// 重试策略：指数退避 + 随机抖动 + 上限
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(600),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &crate::config::RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_interval: Duration::from_secs(config.base_interval_seconds),
            max_interval: Duration::from_secs(config.max_interval_seconds),
            backoff_multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }

    /// 第 retry_count 次重试前的等待时长
    pub fn next_delay(&self, retry_count: i32) -> Duration {
        let exp = self.backoff_multiplier.powi(retry_count.max(0));
        let base = self.base_interval.as_secs_f64() * exp;
        let capped = base.min(self.max_interval.as_secs_f64());
        let jitter = if self.jitter_factor > 0.0 {
            use rand::Rng;
            let mut rng = rand::rng();
            capped * rng.random_range(0.0..self.jitter_factor)
        } else {
            0.0
        };
        let total = (capped + jitter).min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table_contract() {
        let cases = [
            (tasks::PROCESS_NEW_ORDER, queues::HIGH_PRIORITY, 10),
            (tasks::SEND_ORDER_CONFIRMATION, queues::EMAIL, 9),
            (tasks::SEND_ORDER_CANCELLED, queues::EMAIL, 8),
            (tasks::SEND_WELCOME_EMAIL, queues::EMAIL, 7),
            (tasks::NOTIFY_SHOP_OWNER, queues::NOTIFICATIONS, 9),
            (tasks::SEND_SMS, queues::NOTIFICATIONS, 8),
            (tasks::SEND_TELEGRAM_MESSAGE, queues::NOTIFICATIONS, 8),
            (tasks::CANCEL_UNPAID_ORDERS, queues::LOW_PRIORITY, 3),
            (tasks::CLEANUP_OLD_CARTS, queues::LOW_PRIORITY, 2),
            (tasks::GENERATE_SALES_REPORT, queues::LOW_PRIORITY, 4),
        ];
        for (name, queue, priority) in cases {
            let route = route_for(name);
            assert_eq!(route.queue, queue, "{name} 的队列不匹配");
            assert_eq!(route.priority, priority, "{name} 的优先级不匹配");
        }
    }

    #[test]
    fn test_unknown_task_routes_to_default() {
        let route = route_for("some_future_task");
        assert_eq!(route.queue, queues::DEFAULT);
        assert_eq!(route.priority, 5);
    }

    #[test]
    fn test_message_follows_route() {
        let msg = TaskMessage::new(tasks::PROCESS_NEW_ORDER, serde_json::json!({"order_id": 1}));
        assert_eq!(msg.queue, queues::HIGH_PRIORITY);
        assert_eq!(msg.priority, 10);
        assert_eq!(msg.retry_count, 0);
    }

    #[test]
    fn test_retry_copy_gets_new_id() {
        let msg = TaskMessage::new(tasks::SEND_SMS, serde_json::json!({}));
        let retry = msg.retry_copy();
        assert_ne!(retry.id, msg.id);
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.task_name, msg.task_name);
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = TaskMessage::new(tasks::CLEANUP_OLD_CARTS, serde_json::json!({"days": 7}));
        let bytes = msg.serialize_bytes().unwrap();
        let decoded = TaskMessage::deserialize_bytes(&bytes).unwrap();
        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.queue, msg.queue);
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        let d0 = policy.next_delay(0);
        let d1 = policy.next_delay(1);
        let d5 = policy.next_delay(5);
        assert_eq!(d0, Duration::from_secs(60));
        assert_eq!(d1, Duration::from_secs(120));
        // 超过上限后封顶
        assert_eq!(d5, Duration::from_secs(600));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.next_delay(1);
            assert!(delay >= Duration::from_secs(120));
            assert!(delay <= Duration::from_secs(600));
        }
    }

    #[test]
    fn test_retry_exhaustion() {
        let mut msg = TaskMessage::new(tasks::SEND_SMS, serde_json::json!({}));
        assert!(!msg.is_retry_exhausted(3));
        msg.retry_count = 3;
        assert!(msg.is_retry_exhausted(3));
    }
}
