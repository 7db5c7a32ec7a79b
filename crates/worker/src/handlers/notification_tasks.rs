use async_trait::async_trait;
use serde_json::{json, Value};

use shopd_core::models::{tasks, ChatMessagePayload, OrderTaskPayload, SmsPayload};
use shopd_core::traits::{
    ChatNotifier, OrderRepository, SmsSender, TenantRepository, UserRepository,
};
use shopd_core::{ShopError, ShopResult};

use crate::context::TaskContext;
use crate::handlers::{parse_payload, TaskHandler};

/// 通知店主有新订单
pub struct NotifyShopOwnerHandler;

#[async_trait]
impl TaskHandler for NotifyShopOwnerHandler {
    fn name(&self) -> &'static str {
        tasks::NOTIFY_SHOP_OWNER
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
        let items = ctx.order_repo.get_items(order.id).await?;
        let customer = ctx
            .user_repo
            .get_by_id(order.customer_id)
            .await?
            .ok_or(ShopError::UserNotFound {
                id: order.customer_id,
            })?;
        let tenant = ctx
            .tenant_repo
            .get_by_id(order.tenant_id)
            .await?
            .ok_or(ShopError::TenantNotFound {
                id: order.tenant_id,
            })?;
        let owner_id = tenant.owner_id.ok_or_else(|| {
            ShopError::Internal(format!("店铺 {} 没有配置店主", tenant.id))
        })?;

        let message = format!(
            "新订单！\n单号: #{}\n金额: {:.2}\n商品数: {}\n客户: {}\n邮箱: {}\n电话: {}",
            order.order_number,
            order.total,
            items.len(),
            customer.full_name.as_deref().unwrap_or("-"),
            customer.email,
            customer.phone.as_deref().unwrap_or("未提供"),
        );
        ctx.chat.send(&owner_id.to_string(), &message).await?;

        Ok(json!({ "order_id": order.id, "status": "sent" }))
    }
}

/// 发送短信
pub struct SendSmsHandler;

#[async_trait]
impl TaskHandler for SendSmsHandler {
    fn name(&self) -> &'static str {
        tasks::SEND_SMS
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: SmsPayload = parse_payload(payload)?;
        ctx.sms.send(&payload.phone, &payload.message).await?;
        Ok(json!({ "phone": payload.phone, "status": "sent" }))
    }
}

/// 发送外部聊天消息
pub struct SendTelegramMessageHandler;

#[async_trait]
impl TaskHandler for SendTelegramMessageHandler {
    fn name(&self) -> &'static str {
        tasks::SEND_TELEGRAM_MESSAGE
    }

    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> ShopResult<Value> {
        let payload: ChatMessagePayload = parse_payload(payload)?;
        ctx.chat.send(&payload.chat_id, &payload.message).await?;
        Ok(json!({ "chat_id": payload.chat_id, "status": "sent" }))
    }
}
