//! Beat定时调度器
//!
//! 时钟驱动、不持有业务状态：每个tick检查各定时条目的CRON表达式，
//! 到点的任务按路由表投递到普通队列，由worker消费执行。

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use shopd_core::models::{tasks, TaskMessage};
use shopd_core::services::TaskDispatcher;
use shopd_core::ShopResult;
use shopd_infrastructure::metrics;

use crate::cron_utils::CronSchedule;

/// 定时任务条目
pub struct ScheduleEntry {
    pub task_name: String,
    pub cron: CronSchedule,
    pub last_fired: Option<DateTime<Utc>>,
}

/// Beat调度器
///
/// 同名任务最多一个调度定义（HashMap按任务名去重，后注册的覆盖）。
pub struct BeatScheduler {
    dispatcher: TaskDispatcher,
    entries: HashMap<String, ScheduleEntry>,
    tick_interval: Duration,
}

impl BeatScheduler {
    pub fn new(dispatcher: TaskDispatcher, tick_interval: Duration) -> Self {
        Self {
            dispatcher,
            entries: HashMap::new(),
            tick_interval,
        }
    }

    /// 注册定时条目；同名任务的已有定义会被覆盖
    pub fn register(&mut self, task_name: &str, cron_expr: &str) -> ShopResult<()> {
        let cron = CronSchedule::new(cron_expr)?;
        if self
            .entries
            .insert(
                task_name.to_string(),
                ScheduleEntry {
                    task_name: task_name.to_string(),
                    cron,
                    last_fired: None,
                },
            )
            .is_some()
        {
            warn!(task = task_name, "同名定时任务的调度定义被覆盖");
        }
        Ok(())
    }

    /// 内置的调度表
    ///
    /// 节奏与任务名是运维契约，保持不变：
    /// 过期订单取消每小时、购物车清理每日、商品统计每30分钟、
    /// 日/周/月报表、每日备份、搜索重建每6小时、健康检查每5分钟。
    pub fn with_default_schedule(dispatcher: TaskDispatcher, tick_interval: Duration) -> Self {
        let mut beat = Self::new(dispatcher, tick_interval);
        let table = [
            (tasks::CANCEL_UNPAID_ORDERS, "0 0 * * * *"),
            (tasks::CLEANUP_OLD_CARTS, "0 0 3 * * *"),
            (tasks::UPDATE_PRODUCT_STATISTICS, "0 */30 * * * *"),
            (tasks::GENERATE_DAILY_SALES_REPORT, "0 0 9 * * *"),
            (tasks::GENERATE_WEEKLY_ANALYTICS, "0 0 10 * * Mon"),
            (tasks::GENERATE_MONTHLY_REPORT, "0 0 9 1 * *"),
            (tasks::BACKUP_DATABASE, "0 0 2 * * *"),
            (tasks::REINDEX_SEARCH, "0 0 */6 * * *"),
            (tasks::SYSTEM_HEALTH_CHECK, "0 */5 * * * *"),
        ];
        for (name, expr) in table {
            // 内置表达式都是合法的
            if let Err(e) = beat.register(name, expr) {
                error!(task = name, error = %e, "注册内置定时任务失败");
            }
        }
        beat
    }

    pub fn entry(&self, task_name: &str) -> Option<&ScheduleEntry> {
        self.entries.get(task_name)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 执行一次调度扫描，返回本次触发的任务名
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let start = std::time::Instant::now();
        let mut fired = Vec::new();

        for entry in self.entries.values_mut() {
            if !entry.cron.should_trigger(entry.last_fired, now) {
                continue;
            }
            let message = TaskMessage::new(&entry.task_name, json!({}));
            match self.dispatcher.try_dispatch(&message).await {
                Ok(()) => {
                    debug!(task = %entry.task_name, "定时任务已触发");
                    metrics::record_task_enqueued(&message.queue);
                    entry.last_fired = Some(now);
                    fired.push(entry.task_name.clone());
                }
                Err(e) => {
                    // 入队失败时不推进 last_fired，下个tick重试
                    error!(task = %entry.task_name, error = %e, "定时任务入队失败");
                }
            }
        }

        metrics::record_beat_tick(start.elapsed().as_secs_f64());
        if !fired.is_empty() {
            info!(count = fired.len(), "本次调度触发了 {} 个任务", fired.len());
        }
        fired
    }

    /// 运行调度循环，收到关闭信号后退出
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            entries = self.entries.len(),
            tick_seconds = self.tick_interval.as_secs(),
            "Beat调度器启动"
        );

        // 启动时把所有条目视为刚触发过，不补发历史任务
        let startup = Utc::now();
        for entry in self.entries.values_mut() {
            entry.last_fired = Some(startup);
        }

        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Beat调度器收到关闭信号，退出");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shopd_core::traits::MessageQueue;
    use shopd_infrastructure::InMemoryMessageQueue;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_default_schedule_has_all_entries() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let beat = BeatScheduler::with_default_schedule(
            TaskDispatcher::new(queue),
            Duration::from_secs(30),
        );
        assert_eq!(beat.entry_count(), 9);
        for name in [
            tasks::CANCEL_UNPAID_ORDERS,
            tasks::CLEANUP_OLD_CARTS,
            tasks::UPDATE_PRODUCT_STATISTICS,
            tasks::GENERATE_DAILY_SALES_REPORT,
            tasks::GENERATE_WEEKLY_ANALYTICS,
            tasks::GENERATE_MONTHLY_REPORT,
            tasks::BACKUP_DATABASE,
            tasks::REINDEX_SEARCH,
            tasks::SYSTEM_HEALTH_CHECK,
        ] {
            assert!(beat.entry(name).is_some(), "缺少定时任务 {name}");
        }
    }

    #[tokio::test]
    async fn test_tick_fires_due_entry_once() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let mut beat = BeatScheduler::new(
            TaskDispatcher::new(queue.clone()),
            Duration::from_secs(30),
        );
        beat.register(tasks::CANCEL_UNPAID_ORDERS, "0 0 * * * *").unwrap();

        // 上次09:00触发，10:05扫描 -> 触发一次
        beat.entries
            .get_mut(tasks::CANCEL_UNPAID_ORDERS)
            .unwrap()
            .last_fired = Some(at(9, 0));
        let fired = beat.tick(at(10, 5)).await;
        assert_eq!(fired, vec![tasks::CANCEL_UNPAID_ORDERS.to_string()]);
        assert_eq!(queue.get_queue_size("low_priority").await.unwrap(), 1);

        // 同一分辨率内再次扫描不重复触发
        let fired = beat.tick(at(10, 5)).await;
        assert!(fired.is_empty());
        assert_eq!(queue.get_queue_size("low_priority").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let mut beat = BeatScheduler::new(TaskDispatcher::new(queue), Duration::from_secs(30));
        beat.register(tasks::SYSTEM_HEALTH_CHECK, "0 */5 * * * *").unwrap();
        beat.register(tasks::SYSTEM_HEALTH_CHECK, "0 */10 * * * *").unwrap();
        assert_eq!(beat.entry_count(), 1);
        assert_eq!(
            beat.entry(tasks::SYSTEM_HEALTH_CHECK).unwrap().cron.expression(),
            "0 */10 * * * *"
        );
    }

    #[tokio::test]
    async fn test_scheduled_message_follows_routing_table() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let mut beat = BeatScheduler::new(
            TaskDispatcher::new(queue.clone()),
            Duration::from_secs(30),
        );
        beat.register(tasks::SYSTEM_HEALTH_CHECK, "0 */5 * * * *").unwrap();
        beat.entries
            .get_mut(tasks::SYSTEM_HEALTH_CHECK)
            .unwrap()
            .last_fired = Some(at(9, 0));
        beat.tick(at(9, 5)).await;

        let messages = queue.consume_messages("default").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].task_name, tasks::SYSTEM_HEALTH_CHECK);
        assert_eq!(messages[0].priority, 5);
    }
}
