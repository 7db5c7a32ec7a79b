use async_trait::async_trait;
use serde_json::{json, Value};

use shopd_core::models::{tasks, OrderTaskPayload, WelcomeEmailPayload};
use shopd_core::traits::{EmailSender, OrderRepository, UserRepository};
use shopd_core::{ShopError, ShopResult};

use crate::context::TaskContext;
use crate::handlers::{parse_payload, TaskHandler};

async fn load_order_and_customer(
    ctx: &TaskContext,
    order_id: i64,
) -> ShopResult<(shopd_core::models::Order, shopd_core::models::User)> {
    let order = ctx
        .order_repo
        .get_by_id(order_id)
        .await?
        .ok_or(ShopError::OrderNotFound { id: order_id })?;
    let customer = ctx
        .user_repo
        .get_by_id(order.customer_id)
        .await?
        .ok_or(ShopError::UserNotFound {
            id: order.customer_id,
        })?;
    Ok((order, customer))
}

/// 订单确认邮件
pub struct SendOrderConfirmationHandler;

#[async_trait]
impl TaskHandler for SendOrderConfirmationHandler {
    fn name(&self) -> &'static str {
        tasks::SEND_ORDER_CONFIRMATION
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: OrderTaskPayload = parse_payload(payload)?;
        let (order, customer) = load_order_and_customer(ctx, payload.order_id).await?;

        ctx.email
            .send(
                &customer.email,
                &format!("订单确认 #{}", order.order_number),
                &format!(
                    "感谢您的订单 {}，应付金额 {:.2}。我们会尽快为您发货。",
                    order.order_number, order.total
                ),
            )
            .await?;

        Ok(json!({ "order_id": order.id, "status": "sent" }))
    }
}

/// 订单取消邮件
pub struct SendOrderCancelledHandler;

#[async_trait]
impl TaskHandler for SendOrderCancelledHandler {
    fn name(&self) -> &'static str {
        tasks::SEND_ORDER_CANCELLED
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: OrderTaskPayload = parse_payload(payload)?;
        let (order, customer) = load_order_and_customer(ctx, payload.order_id).await?;

        ctx.email
            .send(
                &customer.email,
                &format!("订单取消通知 #{}", order.order_number),
                &format!("您的订单 {} 已取消，占用的库存已释放。", order.order_number),
            )
            .await?;

        Ok(json!({ "order_id": order.id, "status": "sent" }))
    }
}

/// 新店主欢迎邮件
pub struct SendWelcomeEmailHandler;

#[async_trait]
impl TaskHandler for SendWelcomeEmailHandler {
    fn name(&self) -> &'static str {
        tasks::SEND_WELCOME_EMAIL
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: WelcomeEmailPayload = parse_payload(payload)?;
        ctx.email
            .send(
                &payload.email,
                "欢迎入驻",
                &format!("{}，您好！您的店铺已经开通。", payload.full_name),
            )
            .await?;
        Ok(json!({ "email": payload.email, "status": "sent" }))
    }
}
