//! Worker服务
//!
//! 从业务队列拉取任务消息并执行。投递语义为至少一次、迟确认：
//! 处理器成功返回后才确认消息，执行中途进程崩溃会导致重新投递。
//! 失败的任务按指数退避（带抖动、封顶）重新入队，重试耗尽后丢弃，
//! 失败只见于日志和指标。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

use shopd_core::config::WorkerConfig;
use shopd_core::models::{RetryPolicy, TaskMessage};
use shopd_core::traits::MessageQueue;
use shopd_core::ShopError;
use shopd_infrastructure::metrics;

use crate::context::TaskContext;
use crate::handlers::HandlerRegistry;

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    worker_id: String,
    queue: Arc<dyn MessageQueue>,
    registry: Arc<HandlerRegistry>,
    context: Arc<TaskContext>,
    queues: Vec<String>,
    max_concurrent_tasks: usize,
    poll_interval: Duration,
    max_tasks_per_child: u64,
    soft_time_limit: Duration,
    hard_time_limit: Duration,
    retry_policy: RetryPolicy,
}

impl WorkerServiceBuilder {
    pub fn new(
        worker_id: String,
        queue: Arc<dyn MessageQueue>,
        registry: Arc<HandlerRegistry>,
        context: Arc<TaskContext>,
    ) -> Self {
        Self {
            worker_id,
            queue,
            registry,
            context,
            queues: shopd_core::models::queues::ALL
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_concurrent_tasks: 4,
            poll_interval: Duration::from_millis(1000),
            max_tasks_per_child: 1000,
            soft_time_limit: Duration::from_secs(300),
            hard_time_limit: Duration::from_secs(600),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    pub fn max_concurrent_tasks(mut self, max_concurrent_tasks: usize) -> Self {
        self.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn max_tasks_per_child(mut self, max_tasks_per_child: u64) -> Self {
        self.max_tasks_per_child = max_tasks_per_child;
        self
    }

    pub fn time_limits(mut self, soft: Duration, hard: Duration) -> Self {
        self.soft_time_limit = soft;
        self.hard_time_limit = hard;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn build(self) -> WorkerService {
        WorkerService {
            worker_id: self.worker_id,
            queue: self.queue,
            registry: self.registry,
            context: self.context,
            queues: self.queues,
            semaphore: Arc::new(Semaphore::new(self.max_concurrent_tasks)),
            max_concurrent_tasks: self.max_concurrent_tasks,
            poll_interval: self.poll_interval,
            max_tasks_per_child: self.max_tasks_per_child,
            soft_time_limit: self.soft_time_limit,
            hard_time_limit: self.hard_time_limit,
            retry_policy: self.retry_policy,
        }
    }
}

/// Worker服务
pub struct WorkerService {
    worker_id: String,
    queue: Arc<dyn MessageQueue>,
    registry: Arc<HandlerRegistry>,
    context: Arc<TaskContext>,
    queues: Vec<String>,
    semaphore: Arc<Semaphore>,
    max_concurrent_tasks: usize,
    poll_interval: Duration,
    max_tasks_per_child: u64,
    soft_time_limit: Duration,
    hard_time_limit: Duration,
    retry_policy: RetryPolicy,
}

impl WorkerService {
    /// 按应用配置构建Worker
    pub fn from_config(
        config: &WorkerConfig,
        queue: Arc<dyn MessageQueue>,
        registry: Arc<HandlerRegistry>,
        context: Arc<TaskContext>,
    ) -> Self {
        let worker_id = config.worker_id.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string();
            format!("{host}-worker")
        });
        WorkerServiceBuilder::new(worker_id, queue, registry, context)
            .queues(config.queues.clone())
            .max_concurrent_tasks(config.max_concurrent_tasks)
            .poll_interval(Duration::from_millis(config.poll_interval_ms))
            .max_tasks_per_child(config.max_tasks_per_child)
            .time_limits(
                Duration::from_secs(config.soft_time_limit_seconds),
                Duration::from_secs(config.hard_time_limit_seconds),
            )
            .retry_policy(RetryPolicy::from_config(&config.retry))
            .build()
    }

    /// 执行一轮轮询，返回本轮处理的消息数
    ///
    /// 每轮最多预取 `max_concurrent_tasks * 4` 条消息（限制prefetch），
    /// 按队列配置顺序优先消费前面的队列。
    pub async fn poll_once(&self) -> usize {
        let prefetch_limit = self.max_concurrent_tasks * 4;
        let mut handles = Vec::new();

        'queues: for queue_name in &self.queues {
            loop {
                if handles.len() >= prefetch_limit {
                    break 'queues;
                }
                match self.queue.consume_messages(queue_name).await {
                    Ok(messages) if messages.is_empty() => break,
                    Ok(messages) => {
                        for message in messages {
                            handles.push(self.spawn_message(message));
                        }
                    }
                    Err(e) => {
                        warn!(queue = %queue_name, error = %e, "消费队列失败");
                        break;
                    }
                }
            }
        }

        let count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        count
    }

    fn spawn_message(&self, message: TaskMessage) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let registry = Arc::clone(&self.registry);
        let context = Arc::clone(&self.context);
        let semaphore = Arc::clone(&self.semaphore);
        let policy = self.retry_policy.clone();
        let soft_limit = self.soft_time_limit;
        let hard_limit = self.hard_time_limit;

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            execute_message(queue, registry, context, policy, soft_limit, hard_limit, message)
                .await;
        })
    }

    /// 运行worker循环直到收到关闭信号
    ///
    /// 处理满 `max_tasks_per_child` 条后回收循环（计数清零并记录），
    /// 限制潜在泄漏的影响范围。
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            worker_id = %self.worker_id,
            queues = ?self.queues,
            max_concurrent = self.max_concurrent_tasks,
            "Worker服务启动"
        );

        let mut processed: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(worker_id = %self.worker_id, "Worker收到关闭信号");
                    break;
                }
                count = self.poll_once() => {
                    processed += count as u64;
                    if count == 0 {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                    if processed >= self.max_tasks_per_child {
                        info!(
                            worker_id = %self.worker_id,
                            processed,
                            "达到 max_tasks_per_child，回收worker循环"
                        );
                        processed = 0;
                    }
                }
            }
        }

        // 等待在途任务结束（所有并发许可归还）
        let _ = self
            .semaphore
            .acquire_many(self.max_concurrent_tasks as u32)
            .await;
        info!(worker_id = %self.worker_id, "Worker服务已停止");
    }
}

/// 执行单条任务消息：迟确认 + 失败重试
async fn execute_message(
    queue: Arc<dyn MessageQueue>,
    registry: Arc<HandlerRegistry>,
    context: Arc<TaskContext>,
    policy: RetryPolicy,
    soft_limit: Duration,
    hard_limit: Duration,
    message: TaskMessage,
) {
    let start = std::time::Instant::now();

    // 软超时看门狗：超过软限制只告警，任务继续执行
    let watchdog = {
        let task_name = message.task_name.clone();
        let message_id = message.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(soft_limit).await;
            warn!(task = %task_name, message_id = %message_id, "任务超过软超时，仍在执行");
        })
    };

    let result = match registry.get(&message.task_name) {
        Some(handler) => {
            match tokio::time::timeout(hard_limit, handler.handle(&context, &message.payload)).await
            {
                Ok(result) => result,
                Err(_) => Err(ShopError::Internal(format!(
                    "任务超过硬超时 {}s，已中止",
                    hard_limit.as_secs()
                ))),
            }
        }
        None => Err(ShopError::Internal(format!(
            "未注册的任务: {}",
            message.task_name
        ))),
    };
    watchdog.abort();
    let elapsed = start.elapsed();

    match result {
        Ok(summary) => {
            metrics::record_task_executed(&message.task_name, "ok", elapsed.as_secs_f64());
            debug!(
                task = %message.task_name,
                elapsed_ms = elapsed.as_millis() as u64,
                summary = %summary,
                "任务执行成功"
            );
            if let Err(e) = queue.ack_message(&message.id).await {
                warn!(message_id = %message.id, error = %e, "确认消息失败");
            }
        }
        Err(e) => {
            metrics::record_task_executed(&message.task_name, "error", elapsed.as_secs_f64());
            error!(
                task = %message.task_name,
                message_id = %message.id,
                retry_count = message.retry_count,
                error = %e,
                "任务执行失败"
            );
            // 原消息确认出队，重试走带退避的新消息
            if let Err(ack_err) = queue.ack_message(&message.id).await {
                warn!(message_id = %message.id, error = %ack_err, "确认失败消息时出错");
            }

            if message.is_retry_exhausted(policy.max_retries) {
                error!(
                    task = %message.task_name,
                    message_id = %message.id,
                    "任务重试次数耗尽，丢弃"
                );
            } else {
                let retry = message.retry_copy();
                let delay = policy.next_delay(message.retry_count);
                metrics::record_task_retry(&message.task_name);
                info!(
                    task = %retry.task_name,
                    retry_count = retry.retry_count,
                    delay_secs = delay.as_secs(),
                    "任务将在退避后重试"
                );
                let retry_queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = retry_queue.publish_message(&retry.queue, &retry).await {
                        error!(task = %retry.task_name, error = %e, "重试消息入队失败，任务丢失");
                    }
                });
            }
        }
    }
}
