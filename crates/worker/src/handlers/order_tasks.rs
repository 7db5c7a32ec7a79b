use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use shopd_core::models::{tasks, OrderTaskPayload, TaskMessage};
use shopd_core::traits::{EmailSender, OrderRepository, ProductRepository, UserRepository};
use shopd_core::{ShopError, ShopResult};

use crate::context::TaskContext;
use crate::handlers::{parse_payload, TaskHandler};

/// 新订单后续处理：扇出确认邮件和店主通知
pub struct ProcessNewOrderHandler;

#[async_trait]
impl TaskHandler for ProcessNewOrderHandler {
    fn name(&self) -> &'static str {
        tasks::PROCESS_NEW_ORDER
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: OrderTaskPayload = parse_payload(payload)?;
        let order = ctx
            .order_repo
            .get_by_id(payload.order_id)
            .await?
            .ok_or(ShopError::OrderNotFound {
                id: payload.order_id,
            })?;

        info!(order_id = order.id, order_number = %order.order_number, "处理新订单");

        // 下单后的库存水位检查，低于阈值只告警
        let items = ctx.order_repo.get_items(order.id).await?;
        for item in &items {
            if let Some(product) = ctx.product_repo.get_by_id(item.product_id).await? {
                if product.is_low_stock() {
                    warn!(
                        product_id = product.id,
                        stock = product.stock_quantity,
                        threshold = product.low_stock_threshold,
                        "商品库存低于阈值"
                    );
                }
            }
        }

        ctx.dispatcher
            .dispatch(TaskMessage::new(
                tasks::SEND_ORDER_CONFIRMATION,
                json!({ "order_id": order.id }),
            ))
            .await;
        ctx.dispatcher
            .dispatch(TaskMessage::new(
                tasks::NOTIFY_SHOP_OWNER,
                json!({ "order_id": order.id }),
            ))
            .await;

        Ok(json!({ "order_id": order.id, "status": "processed" }))
    }
}

/// 取消超过24小时未支付的 pending 订单并恢复库存
pub struct CancelUnpaidOrdersHandler;

/// 未支付订单的过期时长
pub const UNPAID_ORDER_MAX_AGE_HOURS: i64 = 24;

#[async_trait]
impl TaskHandler for CancelUnpaidOrdersHandler {
    fn name(&self) -> &'static str {
        tasks::CANCEL_UNPAID_ORDERS
    }

    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> ShopResult<Value> {
        let cutoff = Utc::now() - Duration::hours(UNPAID_ORDER_MAX_AGE_HOURS);
        let stale_orders = ctx.order_repo.find_unpaid_before(cutoff).await?;

        let mut cancelled = 0u64;
        for order in stale_orders {
            match ctx.order_repo.cancel_order(order.id).await {
                Ok(_) => {
                    cancelled += 1;
                    ctx.dispatcher
                        .dispatch(TaskMessage::new(
                            tasks::SEND_ORDER_CANCELLED,
                            json!({ "order_id": order.id }),
                        ))
                        .await;
                }
                Err(e) => {
                    // 单个订单失败不中断整批
                    warn!(order_id = order.id, error = %e, "取消过期订单失败");
                }
            }
        }

        info!(cancelled, "过期未支付订单清理完成");
        Ok(json!({ "cancelled_orders": cancelled }))
    }
}

/// 订单状态变更后通知客户
pub struct OrderStatusUpdatedHandler;

#[async_trait]
impl TaskHandler for OrderStatusUpdatedHandler {
    fn name(&self) -> &'static str {
        tasks::ORDER_STATUS_UPDATED
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: OrderTaskPayload = parse_payload(payload)?;
        let order = ctx
            .order_repo
            .get_by_id(payload.order_id)
            .await?
            .ok_or(ShopError::OrderNotFound {
                id: payload.order_id,
            })?;
        let customer = ctx
            .user_repo
            .get_by_id(order.customer_id)
            .await?
            .ok_or(ShopError::UserNotFound {
                id: order.customer_id,
            })?;

        ctx.email
            .send(
                &customer.email,
                &format!("订单 {} 状态更新", order.order_number),
                &format!("您的订单当前状态：{}", order.status.as_str()),
            )
            .await?;

        Ok(json!({ "order_id": order.id, "status": "sent" }))
    }
}
