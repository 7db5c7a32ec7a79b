//! 订单管线集成测试
//!
//! 用内存mock仓储 + 内存消息队列驱动完整的下单/取消/支付回调流程。

use std::sync::Arc;

use shopd_core::models::{queues, tasks, OrderStatus, PaymentStatus, TaskMessage, User};
use shopd_core::services::{
    CreateOrderRequest, OrderService, PaymentEvent, RequestedItem, TaskDispatcher,
};
use shopd_core::traits::MessageQueue;
use shopd_core::ShopError;
use shopd_infrastructure::{InMemoryCache, InMemoryMessageQueue};
use shopd_testing_utils::{
    test_address, DiscountBuilder, FailingMessageQueue, InMemoryStore, MockDiscountRepository,
    MockOrderRepository, MockProductRepository, ProductBuilder, TenantBuilder, UserBuilder,
};

struct TestWorld {
    store: Arc<InMemoryStore>,
    queue: Arc<InMemoryMessageQueue>,
    service: OrderService,
    customer: User,
    owner: User,
}

fn build_world() -> TestWorld {
    let store = InMemoryStore::new();
    let queue = Arc::new(InMemoryMessageQueue::new());

    store.seed_tenant(TenantBuilder::new(1).owner(20).build());
    let customer = UserBuilder::new(10).tenant(1).build();
    let owner = UserBuilder::new(20)
        .role(shopd_core::models::UserRole::TenantOwner)
        .tenant(1)
        .email("owner@example.com")
        .build();
    store.seed_user(customer.clone());
    store.seed_user(owner.clone());

    let service = OrderService::new(
        Arc::new(MockOrderRepository::new(Arc::clone(&store))),
        Arc::new(MockProductRepository::new(Arc::clone(&store))),
        Arc::new(MockDiscountRepository::new(Arc::clone(&store))),
        TaskDispatcher::new(queue.clone() as Arc<dyn MessageQueue>),
        Arc::new(InMemoryCache::new()),
    );

    TestWorld {
        store,
        queue,
        service,
        customer,
        owner,
    }
}

fn request(items: Vec<RequestedItem>) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        shipping_address: test_address(),
        billing_address: None,
        payment_method: Some("card".to_string()),
        notes: None,
        discount_code: None,
    }
}

fn item(product_id: i64, quantity: i32) -> RequestedItem {
    RequestedItem {
        product_id,
        variant_id: None,
        quantity,
        selected_attributes: None,
    }
}

async fn drain_queues(queue: &InMemoryMessageQueue) {
    for name in queues::ALL {
        queue.purge_queue(name).await.unwrap();
    }
}

#[tokio::test]
async fn test_checkout_totals_invariant() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).price(50.0).discount_price(40.0).stock(10).build());
    world
        .store
        .seed_product(ProductBuilder::new(101, 1).price(25.0).stock(10).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 2), item(101, 3)]))
        .await
        .unwrap();

    // 40*2 + 25*3 = 155，税10%
    assert!((order.subtotal - 155.0).abs() < 1e-9);
    assert!((order.tax_amount - 15.5).abs() < 1e-9);
    assert_eq!(order.shipping_cost, 0.0);
    let expected = order.subtotal - order.discount_amount + order.shipping_cost + order.tax_amount;
    assert!((order.total - expected).abs() < 1e-9);
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_state_untouched() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let err = world
        .service
        .create_order(&world.customer, request(vec![item(100, 6)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::InsufficientStock { product_id: 100 }));

    let product = world.store.product(100).unwrap();
    assert_eq!(product.stock_quantity, 5);
    assert_eq!(product.sales_count, 0);
    assert_eq!(world.store.order_count(), 0);
    // 失败的下单不触发任何任务
    assert_eq!(
        world.queue.get_queue_size(queues::HIGH_PRIORITY).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_checkout_adjusts_inventory_and_clears_cart() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());
    world.store.seed_cart_item(shopd_core::models::CartItem {
        id: 900,
        customer_id: world.customer.id,
        product_id: 100,
        variant_id: None,
        quantity: 3,
        selected_attributes: None,
        added_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    });

    world
        .service
        .create_order(&world.customer, request(vec![item(100, 3)]))
        .await
        .unwrap();

    let product = world.store.product(100).unwrap();
    assert_eq!(product.stock_quantity, 2);
    assert_eq!(product.sales_count, 3);
    // 下单成功后购物车立即为空
    assert_eq!(world.store.cart_count(world.customer.id), 0);
}

#[tokio::test]
async fn test_checkout_enqueues_process_new_order() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();

    let messages = world
        .queue
        .consume_messages(queues::HIGH_PRIORITY)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    let message: &TaskMessage = &messages[0];
    assert_eq!(message.task_name, tasks::PROCESS_NEW_ORDER);
    assert_eq!(message.priority, 10);
    assert_eq!(message.payload["order_id"], order.id);
    assert_eq!(message.correlation_id.as_deref(), Some(order.order_number.as_str()));
}

#[tokio::test]
async fn test_checkout_survives_broker_outage() {
    let store = InMemoryStore::new();
    store.seed_tenant(TenantBuilder::new(1).owner(20).build());
    let customer = UserBuilder::new(10).tenant(1).build();
    store.seed_user(customer.clone());
    store.seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let service = OrderService::new(
        Arc::new(MockOrderRepository::new(Arc::clone(&store))),
        Arc::new(MockProductRepository::new(Arc::clone(&store))),
        Arc::new(MockDiscountRepository::new(Arc::clone(&store))),
        TaskDispatcher::new(Arc::new(FailingMessageQueue)),
        Arc::new(InMemoryCache::new()),
    );

    // Broker不可达时订单创建仍然成功
    let order = service
        .create_order(&customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    assert_eq!(store.order_count(), 1);
    assert_eq!(store.order(order.id).unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_checkout_does_not_oversell() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(1).build());

    let (first, second) = tokio::join!(
        world
            .service
            .create_order(&world.customer, request(vec![item(100, 1)])),
        world
            .service
            .create_order(&world.customer, request(vec![item(100, 1)])),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "库存为1时两个并发下单只能成功一个");
    let failure = if first.is_err() { first } else { second };
    assert!(matches!(
        failure.unwrap_err(),
        ShopError::InsufficientStock { product_id: 100 }
    ));
    assert_eq!(world.store.product(100).unwrap().stock_quantity, 0);
}

#[tokio::test]
async fn test_cancel_pending_restores_inventory() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).sales(7).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 2)]))
        .await
        .unwrap();
    assert_eq!(world.store.product(100).unwrap().stock_quantity, 3);
    drain_queues(&world.queue).await;

    let cancelled = world
        .service
        .cancel_order(&world.customer, order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let product = world.store.product(100).unwrap();
    assert_eq!(product.stock_quantity, 5);
    assert_eq!(product.sales_count, 7);

    let messages = world.queue.consume_messages(queues::EMAIL).await.unwrap();
    assert_eq!(messages[0].task_name, tasks::SEND_ORDER_CANCELLED);
}

#[tokio::test]
async fn test_cancel_non_pending_rejected() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    world
        .service
        .handle_payment_webhook(order.id, PaymentEvent::Succeeded)
        .await
        .unwrap();

    let err = world
        .service
        .cancel_order(&world.customer, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
    // 已确认订单的库存不被回滚
    assert_eq!(world.store.product(100).unwrap().stock_quantity, 4);
}

#[tokio::test]
async fn test_cancel_requires_ownership() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());
    let stranger = UserBuilder::new(99).build();
    world.store.seed_user(stranger.clone());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();

    let err = world
        .service
        .cancel_order(&stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Forbidden));
}

#[tokio::test]
async fn test_payment_webhook_is_idempotent() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    drain_queues(&world.queue).await;

    let confirmed = world
        .service
        .handle_payment_webhook(order.id, PaymentEvent::Succeeded)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
    assert_eq!(world.queue.get_queue_size(queues::EMAIL).await.unwrap(), 1);
    assert_eq!(
        world.queue.get_queue_size(queues::NOTIFICATIONS).await.unwrap(),
        1
    );

    // 重复投递的成功回调不再触发任何任务
    let replay = world
        .service
        .handle_payment_webhook(order.id, PaymentEvent::Succeeded)
        .await
        .unwrap();
    assert_eq!(replay.payment_status, PaymentStatus::Paid);
    assert_eq!(world.queue.get_queue_size(queues::EMAIL).await.unwrap(), 1);
    assert_eq!(
        world.queue.get_queue_size(queues::NOTIFICATIONS).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_payment_failure_marks_payment_failed() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    let failed = world
        .service
        .handle_payment_webhook(order.id, PaymentEvent::Failed)
        .await
        .unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    // 支付失败不改变订单状态
    assert_eq!(failed.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_update_status_permissions_and_transitions() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(5).build());

    let order = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();

    // 普通客户不能改状态
    let err = world
        .service
        .update_order_status(&world.customer, order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Forbidden));

    // 店主确认订单，同时置为已支付
    let confirmed = world
        .service
        .update_order_status(&world.owner, order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    // 状态机不允许回退
    let err = world
        .service
        .update_order_status(&world.owner, order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
}

#[tokio::test]
async fn test_order_listing_supports_status_filter() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).stock(50).build());

    let first = world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    world
        .service
        .create_order(&world.customer, request(vec![item(100, 1)]))
        .await
        .unwrap();
    world
        .service
        .cancel_order(&world.customer, first.id)
        .await
        .unwrap();

    let all = world
        .service
        .list_orders(&world.customer, None, 1, 50)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let cancelled = world
        .service
        .list_orders(&world.customer, Some(OrderStatus::Cancelled), 1, 50)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, first.id);

    let tenant_pending = world
        .service
        .list_tenant_orders(&world.owner, Some(OrderStatus::Pending), 1, 50)
        .await
        .unwrap();
    assert_eq!(tenant_pending.len(), 1);
}

#[tokio::test]
async fn test_discount_code_applied_and_usage_counted() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).price(100.0).stock(10).build());
    world
        .store
        .seed_discount(DiscountBuilder::new(500, 1, "SAVE10").value(10.0).build());

    let mut req = request(vec![item(100, 2)]);
    req.discount_code = Some("SAVE10".to_string());
    let order = world.service.create_order(&world.customer, req).await.unwrap();

    // 200 的 10% = 20
    assert!((order.discount_amount - 20.0).abs() < 1e-9);
    assert!((order.total - (200.0 - 20.0 + 20.0)).abs() < 1e-9);
    assert_eq!(world.store.discount(500).unwrap().usage_count, 1);
}

#[tokio::test]
async fn test_invalid_discount_code_rejected() {
    let world = build_world();
    world
        .store
        .seed_product(ProductBuilder::new(100, 1).price(100.0).stock(10).build());
    world
        .store
        .seed_discount(DiscountBuilder::new(500, 1, "EXPIRED").expired().build());

    let mut req = request(vec![item(100, 1)]);
    req.discount_code = Some("EXPIRED".to_string());
    let err = world
        .service
        .create_order(&world.customer, req)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation(_)));
    assert_eq!(world.store.order_count(), 0);

    let mut req = request(vec![item(100, 1)]);
    req.discount_code = Some("MISSING".to_string());
    let err = world
        .service
        .create_order(&world.customer, req)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation(_)));
}

#[tokio::test]
async fn test_customer_without_tenant_rejected() {
    let world = build_world();
    let orphan = UserBuilder::new(55).build();
    world.store.seed_user(orphan.clone());
    let err = world
        .service
        .create_order(&orphan, request(vec![item(100, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation(_)));
}
