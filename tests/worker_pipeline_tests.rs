//! Worker任务管线集成测试
//!
//! 用内存队列和mock仓储驱动worker的消费/迟确认/重试路径，以及
//! 各个叶子任务处理器。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use shopd_core::models::{
    queues, tasks, Address, Order, OrderItem, OrderStatus, PaymentStatus, RetryPolicy, TaskMessage,
};
use shopd_core::services::TaskDispatcher;
use shopd_core::traits::{CacheStore, MessageQueue};
use shopd_core::{ShopError, ShopResult};
use shopd_infrastructure::{InMemoryCache, InMemoryMessageQueue};
use shopd_testing_utils::{
    test_address, InMemoryStore, MockCartRepository, MockOrderRepository, MockProductRepository,
    MockTenantRepository, MockUserRepository, ProductBuilder, RecordingChatNotifier,
    RecordingEmailSender, RecordingSmsSender, TenantBuilder, UserBuilder,
};
use shopd_worker::{HandlerRegistry, TaskContext, TaskHandler, WorkerServiceBuilder};

struct World {
    store: Arc<InMemoryStore>,
    queue: Arc<InMemoryMessageQueue>,
    context: Arc<TaskContext>,
    email: Arc<RecordingEmailSender>,
    chat: Arc<RecordingChatNotifier>,
}

fn build_world() -> World {
    let store = InMemoryStore::new();
    let queue = Arc::new(InMemoryMessageQueue::new());
    let email = RecordingEmailSender::new();
    let chat = RecordingChatNotifier::new();

    store.seed_tenant(TenantBuilder::new(1).owner(20).build());
    store.seed_user(UserBuilder::new(10).tenant(1).phone("+86-13800000000").build());
    store.seed_user(
        UserBuilder::new(20)
            .role(shopd_core::models::UserRole::TenantOwner)
            .tenant(1)
            .email("owner@example.com")
            .build(),
    );

    let context = Arc::new(TaskContext {
        order_repo: Arc::new(MockOrderRepository::new(Arc::clone(&store))),
        product_repo: Arc::new(MockProductRepository::new(Arc::clone(&store))),
        cart_repo: Arc::new(MockCartRepository::new(Arc::clone(&store))),
        tenant_repo: Arc::new(MockTenantRepository::new(Arc::clone(&store))),
        user_repo: Arc::new(MockUserRepository::new(Arc::clone(&store))),
        queue: queue.clone() as Arc<dyn MessageQueue>,
        dispatcher: TaskDispatcher::new(queue.clone() as Arc<dyn MessageQueue>),
        cache: Arc::new(InMemoryCache::new()),
        email: email.clone(),
        sms: RecordingSmsSender::new(),
        chat: chat.clone(),
        cache_ttl_seconds: 3600,
    });

    World {
        store,
        queue,
        context,
        email,
        chat,
    }
}

fn seed_order(
    world: &World,
    id: i64,
    status: OrderStatus,
    payment_status: PaymentStatus,
    age_hours: i64,
    product_id: i64,
    quantity: i32,
) -> Order {
    let created_at = Utc::now() - chrono::Duration::hours(age_hours);
    let address: Address = test_address();
    let order = Order {
        id,
        tenant_id: 1,
        customer_id: 10,
        order_number: format!("ORD-{id:08X}"),
        subtotal: 100.0,
        discount_amount: 0.0,
        shipping_cost: 0.0,
        tax_amount: 10.0,
        total: 110.0,
        discount_code: None,
        shipping_address: address.clone(),
        billing_address: address,
        status,
        payment_status,
        payment_method: Some("card".to_string()),
        tracking_number: None,
        notes: None,
        created_at,
        updated_at: created_at,
    };
    let items = vec![OrderItem {
        id: id * 100,
        order_id: id,
        product_id,
        variant_id: None,
        product_name: "商品".to_string(),
        product_attributes: None,
        quantity,
        unit_price: 100.0,
        total_price: 100.0 * quantity as f64,
        created_at,
    }];
    world.store.seed_order(order.clone(), items);
    order
}

fn fast_retry_policy(max_retries: i32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_interval: Duration::from_millis(0),
        max_interval: Duration::from_millis(0),
        backoff_multiplier: 1.0,
        jitter_factor: 0.0,
    }
}

fn build_worker(
    world: &World,
    registry: HandlerRegistry,
    max_retries: i32,
) -> shopd_worker::WorkerService {
    WorkerServiceBuilder::new(
        "test-worker".to_string(),
        world.queue.clone() as Arc<dyn MessageQueue>,
        Arc::new(registry),
        Arc::clone(&world.context),
    )
    .max_concurrent_tasks(4)
    .poll_interval(Duration::from_millis(10))
    .retry_policy(fast_retry_policy(max_retries))
    .build()
}

#[tokio::test]
async fn test_process_new_order_fans_out_notifications() {
    let world = build_world();
    seed_order(&world, 1, OrderStatus::Pending, PaymentStatus::Pending, 0, 100, 1);

    let message = TaskMessage::new(tasks::PROCESS_NEW_ORDER, json!({ "order_id": 1 }));
    world
        .queue
        .publish_message(&message.queue, &message)
        .await
        .unwrap();

    let worker = build_worker(&world, HandlerRegistry::standard(), 3);
    // 多轮轮询直到扇出的任务全部消费：process_new_order + 确认邮件 + 店主通知
    let mut total = 0;
    for _ in 0..5 {
        total += worker.poll_once().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(total, 3);

    let sent = world.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "user10@example.com");
    assert!(sent[0].1.contains("订单确认"));

    let chats = world.chat.sent();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].0, "20");
    assert!(chats[0].1.contains("新订单"));

    // 全部迟确认完成后没有残留
    assert_eq!(world.queue.unacked_count().await, 0);
}

#[tokio::test]
async fn test_cancel_unpaid_orders_only_cancels_stale_pending() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(0).sales(5).build());

    // 25小时前的未支付订单 -> 应取消并恢复库存
    seed_order(&world, 1, OrderStatus::Pending, PaymentStatus::Pending, 25, 100, 2);
    // 1小时前的未支付订单 -> 保留
    seed_order(&world, 2, OrderStatus::Pending, PaymentStatus::Pending, 1, 100, 1);
    // 25小时前但已支付 -> 保留
    seed_order(&world, 3, OrderStatus::Confirmed, PaymentStatus::Paid, 25, 100, 1);

    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::CANCEL_UNPAID_ORDERS).unwrap();
    let summary = handler.handle(&world.context, &json!({})).await.unwrap();
    assert_eq!(summary["cancelled_orders"], 1);

    assert_eq!(world.store.order(1).unwrap().status, OrderStatus::Cancelled);
    assert_eq!(world.store.order(2).unwrap().status, OrderStatus::Pending);
    assert_eq!(world.store.order(3).unwrap().status, OrderStatus::Confirmed);

    // 库存恢复2件，销量回退2件
    let product = world.store.product(100).unwrap();
    assert_eq!(product.stock_quantity, 2);
    assert_eq!(product.sales_count, 3);

    // 给被取消的订单发取消邮件任务
    let messages = world.queue.consume_messages(queues::EMAIL).await.unwrap();
    assert_eq!(messages[0].task_name, tasks::SEND_ORDER_CANCELLED);
    assert_eq!(messages[0].payload["order_id"], 1);
}

/// 前N次失败然后成功的处理器
struct FlakyHandler {
    fail_times: u32,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    fn name(&self) -> &'static str {
        "flaky_test_task"
    }

    async fn handle(&self, _ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            Err(ShopError::Internal("模拟失败".into()))
        } else {
            Ok(json!({ "attempt": attempt }))
        }
    }
}

#[tokio::test]
async fn test_failed_task_retried_with_backoff_then_succeeds() {
    let world = build_world();
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = HandlerRegistry::standard();
    registry.register(Arc::new(FlakyHandler {
        fail_times: 1,
        attempts: attempts.clone(),
    }));

    let message = TaskMessage::new("flaky_test_task", json!({}));
    world
        .queue
        .publish_message(&message.queue, &message)
        .await
        .unwrap();

    let worker = build_worker(&world, registry, 3);
    // 第一次执行失败，重试消息以零退避重新入队
    assert_eq!(worker.poll_once().await, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.queue.get_queue_size(queues::DEFAULT).await.unwrap(), 1);

    // 第二次执行成功
    assert_eq!(worker.poll_once().await, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.queue.get_queue_size(queues::DEFAULT).await.unwrap(), 0);
    assert_eq!(world.queue.unacked_count().await, 0);
}

#[tokio::test]
async fn test_retry_exhaustion_drops_task() {
    let world = build_world();
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = HandlerRegistry::standard();
    registry.register(Arc::new(FlakyHandler {
        fail_times: u32::MAX,
        attempts: attempts.clone(),
    }));

    let message = TaskMessage::new("flaky_test_task", json!({}));
    world
        .queue
        .publish_message(&message.queue, &message)
        .await
        .unwrap();

    let worker = build_worker(&world, registry, 1);
    // 原始执行 + 1次重试，然后丢弃
    for _ in 0..4 {
        worker.poll_once().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(world.queue.get_queue_size(queues::DEFAULT).await.unwrap(), 0);
    assert_eq!(world.queue.unacked_count().await, 0);
}

#[tokio::test]
async fn test_hard_time_limit_aborts_and_retries() {
    struct SlowHandler;

    #[async_trait]
    impl TaskHandler for SlowHandler {
        fn name(&self) -> &'static str {
            "slow_test_task"
        }

        async fn handle(&self, _ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    let world = build_world();
    let mut registry = HandlerRegistry::standard();
    registry.register(Arc::new(SlowHandler));

    let message = TaskMessage::new("slow_test_task", json!({}));
    world
        .queue
        .publish_message(&message.queue, &message)
        .await
        .unwrap();

    let worker = WorkerServiceBuilder::new(
        "test-worker".to_string(),
        world.queue.clone() as Arc<dyn MessageQueue>,
        Arc::new(registry),
        Arc::clone(&world.context),
    )
    .time_limits(Duration::from_millis(10), Duration::from_millis(50))
    .retry_policy(fast_retry_policy(1))
    .build();

    // 硬超时中止，计为一次失败并触发重试
    assert_eq!(worker.poll_once().await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.queue.get_queue_size(queues::DEFAULT).await.unwrap(), 1);
}

#[tokio::test]
async fn test_cleanup_old_carts_removes_only_stale_items() {
    let world = build_world();
    let now = Utc::now();
    world.store.seed_cart_item(shopd_core::models::CartItem {
        id: 1,
        customer_id: 10,
        product_id: 100,
        variant_id: None,
        quantity: 1,
        selected_attributes: None,
        added_at: now - chrono::Duration::days(8),
        updated_at: now - chrono::Duration::days(8),
    });
    world.store.seed_cart_item(shopd_core::models::CartItem {
        id: 2,
        customer_id: 10,
        product_id: 100,
        variant_id: None,
        quantity: 1,
        selected_attributes: None,
        added_at: now,
        updated_at: now,
    });

    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::CLEANUP_OLD_CARTS).unwrap();
    let summary = handler.handle(&world.context, &json!({})).await.unwrap();
    assert_eq!(summary["deleted_carts"], 1);
    assert_eq!(world.store.cart_count(10), 1);
}

#[tokio::test]
async fn test_update_product_statistics_writes_cache() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(3).sales(11).build());
    world
        .store
        .seed_product(ProductBuilder::new(101, 1).stock(0).sales(4).build());

    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::UPDATE_PRODUCT_STATISTICS).unwrap();
    let summary = handler.handle(&world.context, &json!({})).await.unwrap();
    assert_eq!(summary["tenants"], 1);

    let cached = world
        .context
        .cache
        .get("stats:tenant:1")
        .await
        .unwrap()
        .expect("统计缓存应已写入");
    let stats: Value = serde_json::from_str(&cached).unwrap();
    assert_eq!(stats["total_products"], 2);
    assert_eq!(stats["in_stock_products"], 1);
    assert_eq!(stats["total_sales"], 15);
}

#[tokio::test]
async fn test_sales_report_summarizes_window() {
    let world = build_world();
    seed_order(&world, 1, OrderStatus::Confirmed, PaymentStatus::Paid, 2, 100, 1);
    seed_order(&world, 2, OrderStatus::Cancelled, PaymentStatus::Pending, 2, 100, 1);
    // 窗口外的订单
    seed_order(&world, 3, OrderStatus::Confirmed, PaymentStatus::Paid, 30, 100, 1);

    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::GENERATE_DAILY_SALES_REPORT).unwrap();
    let summary = handler.handle(&world.context, &json!({})).await.unwrap();
    // cancelled 和窗口外订单不计入
    assert_eq!(summary["orders"], 1);
    assert_eq!(summary["revenue"], 110.0);
}

#[tokio::test]
async fn test_system_health_check_reports_components() {
    let world = build_world();
    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::SYSTEM_HEALTH_CHECK).unwrap();
    let summary = handler.handle(&world.context, &json!({})).await.unwrap();
    assert_eq!(summary["database"], true);
    assert_eq!(summary["cache"], true);
}

#[tokio::test]
async fn test_welcome_email_task() {
    let world = build_world();
    let registry = HandlerRegistry::standard();
    let handler = registry.get(tasks::SEND_WELCOME_EMAIL).unwrap();
    handler
        .handle(
            &world.context,
            &json!({ "email": "new-owner@example.com", "full_name": "新店主" }),
        )
        .await
        .unwrap();
    let sent = world.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "new-owner@example.com");
}
