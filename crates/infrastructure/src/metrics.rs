//! Prometheus指标

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use shopd_core::{ShopError, ShopResult};

/// 安装Prometheus recorder，返回渲染句柄（挂到 GET /metrics）
pub fn install_metrics_recorder() -> ShopResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ShopError::Configuration(format!("安装指标recorder失败: {e}")))?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!("shopd_orders_created_total", "创建成功的订单数");
    describe_counter!("shopd_orders_cancelled_total", "取消的订单数");
    describe_counter!("shopd_tasks_enqueued_total", "入队的任务数");
    describe_counter!("shopd_tasks_executed_total", "执行的任务数（按任务名和结果）");
    describe_counter!("shopd_task_retries_total", "任务重试次数");
    describe_histogram!("shopd_task_duration_seconds", "任务执行耗时");
    describe_histogram!("shopd_beat_tick_duration_seconds", "Beat调度tick耗时");
}

pub fn record_order_created(total: f64) {
    counter!("shopd_orders_created_total").increment(1);
    histogram!("shopd_order_total_amount").record(total);
}

pub fn record_order_cancelled() {
    counter!("shopd_orders_cancelled_total").increment(1);
}

pub fn record_task_enqueued(queue: &str) {
    counter!("shopd_tasks_enqueued_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_task_executed(task: &str, outcome: &str, duration_seconds: f64) {
    counter!(
        "shopd_tasks_executed_total",
        "task" => task.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("shopd_task_duration_seconds", "task" => task.to_string())
        .record(duration_seconds);
}

pub fn record_task_retry(task: &str) {
    counter!("shopd_task_retries_total", "task" => task.to_string()).increment(1);
}

pub fn record_beat_tick(duration_seconds: f64) {
    histogram!("shopd_beat_tick_duration_seconds").record(duration_seconds);
}
