//! 订单服务
//!
//! 下单主流程的编排方：定价 -> 事务落库（订单+行项目+库存扣减+清空
//! 购物车）-> 提交后尽力而为地投递异步任务、失效缓存。队列或缓存
//! 不可用不影响订单结果。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::{ShopError, ShopResult};
use crate::models::{
    generate_order_number, tasks, Address, NewOrder, Order, OrderItem, OrderStatus, PaymentStatus,
    TaskMessage, User,
};
use crate::services::dispatch::TaskDispatcher;
use crate::services::pricing::{self, RequestedItem};
use crate::traits::{cache_keys, CacheStore, DiscountRepository, OrderRepository, ProductRepository};

/// 订单号冲突时的重试上限
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// 下单请求
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub items: Vec<RequestedItem>,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub discount_code: Option<String>,
}

/// 支付回调事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    Succeeded,
    Failed,
}

pub struct OrderService {
    order_repo: Arc<dyn OrderRepository>,
    product_repo: Arc<dyn ProductRepository>,
    discount_repo: Arc<dyn DiscountRepository>,
    dispatcher: TaskDispatcher,
    cache: Arc<dyn CacheStore>,
}

impl OrderService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        product_repo: Arc<dyn ProductRepository>,
        discount_repo: Arc<dyn DiscountRepository>,
        dispatcher: TaskDispatcher,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            order_repo,
            product_repo,
            discount_repo,
            dispatcher,
            cache,
        }
    }

    /// 创建订单
    pub async fn create_order(&self, actor: &User, req: CreateOrderRequest) -> ShopResult<Order> {
        let tenant_id = actor
            .tenant_id
            .ok_or_else(|| ShopError::Validation("用户未关联任何店铺".into()))?;
        if req.items.is_empty() {
            return Err(ShopError::Validation("订单不能没有行项目".into()));
        }

        let product_ids: Vec<i64> = req.items.iter().map(|i| i.product_id).collect();
        let products: HashMap<i64, _> = self
            .product_repo
            .get_many(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let discount = match req.discount_code.as_deref() {
            Some(code) => Some(
                self.discount_repo
                    .get_by_code(tenant_id, code)
                    .await?
                    .ok_or_else(|| ShopError::Validation(format!("优惠码 {code} 不存在")))?,
            ),
            None => None,
        };

        let priced =
            pricing::price_order(&products, &req.items, tenant_id, discount.as_ref(), Utc::now())?;

        let billing_address = req
            .billing_address
            .clone()
            .unwrap_or_else(|| req.shipping_address.clone());

        // 订单号为随机十六进制，碰撞时换号重试
        let mut attempt = 0;
        let order = loop {
            let new_order = NewOrder {
                tenant_id,
                customer_id: actor.id,
                order_number: generate_order_number(),
                subtotal: priced.subtotal,
                discount_amount: priced.discount_amount,
                shipping_cost: priced.shipping_cost,
                tax_amount: priced.tax_amount,
                total: priced.total,
                discount_code: req.discount_code.clone(),
                shipping_address: req.shipping_address.clone(),
                billing_address: billing_address.clone(),
                payment_method: req.payment_method.clone(),
                notes: req.notes.clone(),
                items: priced.items.clone(),
            };
            match self.order_repo.create_order(&new_order).await {
                Ok(order) => break order,
                Err(e) if e.is_unique_violation() && attempt < MAX_ORDER_NUMBER_ATTEMPTS => {
                    attempt += 1;
                    debug!(attempt, "订单号冲突，重新生成");
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(discount_id) = priced.discount_id {
            if let Err(e) = self.discount_repo.increment_usage(discount_id).await {
                warn!(discount_id, error = %e, "优惠码使用计数更新失败");
            }
        }

        info!(
            order_id = order.id,
            order_number = %order.order_number,
            total = order.total,
            "订单创建成功"
        );

        self.invalidate_product_caches(tenant_id, &product_ids).await;
        self.dispatcher
            .dispatch(
                TaskMessage::new(tasks::PROCESS_NEW_ORDER, json!({ "order_id": order.id }))
                    .with_correlation_id(order.order_number.clone()),
            )
            .await;

        Ok(order)
    }

    /// 获取订单详情（含行项目），校验归属
    pub async fn get_order(&self, actor: &User, order_id: i64) -> ShopResult<(Order, Vec<OrderItem>)> {
        let order = self.require_order(order_id).await?;
        self.require_access(actor, &order)?;
        let items = self.order_repo.get_items(order_id).await?;
        Ok((order, items))
    }

    /// 当前客户的订单列表，支持按状态过滤
    pub async fn list_orders(
        &self,
        actor: &User,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let (page, page_size) = normalize_page(page, page_size);
        self.order_repo
            .list_by_customer(actor.id, status, page, page_size)
            .await
    }

    /// 租户维度的订单列表（店主/店员）
    pub async fn list_tenant_orders(
        &self,
        actor: &User,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let tenant_id = actor.tenant_id.ok_or(ShopError::Forbidden)?;
        if !actor.can_manage_tenant(tenant_id) {
            return Err(ShopError::Forbidden);
        }
        let (page, page_size) = normalize_page(page, page_size);
        self.order_repo
            .list_by_tenant(tenant_id, status, page, page_size)
            .await
    }

    /// 取消订单：仅 pending 可取消，恢复库存，随后尽力通知
    pub async fn cancel_order(&self, actor: &User, order_id: i64) -> ShopResult<Order> {
        let order = self.require_order(order_id).await?;
        self.require_access(actor, &order)?;

        let items = self.order_repo.get_items(order_id).await?;
        let cancelled = self.order_repo.cancel_order(order_id).await?;

        info!(order_id, order_number = %cancelled.order_number, "订单已取消");

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        self.invalidate_product_caches(cancelled.tenant_id, &product_ids)
            .await;
        self.invalidate_order_cache(order_id).await;
        self.dispatcher
            .dispatch(TaskMessage::new(
                tasks::SEND_ORDER_CANCELLED,
                json!({ "order_id": order_id }),
            ))
            .await;

        Ok(cancelled)
    }

    /// 店主更新订单状态；进入 confirmed 同时置为已支付
    pub async fn update_order_status(
        &self,
        actor: &User,
        order_id: i64,
        new_status: OrderStatus,
    ) -> ShopResult<Order> {
        let order = self.require_order(order_id).await?;
        if !actor.can_manage_tenant(order.tenant_id) {
            return Err(ShopError::Forbidden);
        }
        if !order.status.can_transition_to(new_status) {
            return Err(ShopError::Conflict(format!(
                "订单状态不允许从 {} 变更为 {}",
                order.status.as_str(),
                new_status.as_str()
            )));
        }

        let payment_status = matches!(new_status, OrderStatus::Confirmed).then_some(PaymentStatus::Paid);
        let updated = self
            .order_repo
            .update_status(order_id, new_status, payment_status)
            .await?;

        self.invalidate_order_cache(order_id).await;
        self.dispatcher
            .dispatch(TaskMessage::new(
                tasks::ORDER_STATUS_UPDATED,
                json!({ "order_id": order_id, "status": new_status.as_str() }),
            ))
            .await;

        Ok(updated)
    }

    /// 支付回调
    ///
    /// 成功路径是幂等的：重复投递的成功回调不会再次触发通知任务。
    pub async fn handle_payment_webhook(
        &self,
        order_id: i64,
        event: PaymentEvent,
    ) -> ShopResult<Order> {
        match event {
            PaymentEvent::Succeeded => {
                match self.order_repo.mark_paid_if_unpaid(order_id).await? {
                    Some(order) => {
                        info!(order_id, "支付成功，订单已确认");
                        self.invalidate_order_cache(order_id).await;
                        self.dispatcher
                            .dispatch(TaskMessage::new(
                                tasks::SEND_ORDER_CONFIRMATION,
                                json!({ "order_id": order_id }),
                            ))
                            .await;
                        self.dispatcher
                            .dispatch(TaskMessage::new(
                                tasks::NOTIFY_SHOP_OWNER,
                                json!({ "order_id": order_id }),
                            ))
                            .await;
                        Ok(order)
                    }
                    None => {
                        debug!(order_id, "重复的支付成功回调，忽略");
                        self.require_order(order_id).await
                    }
                }
            }
            PaymentEvent::Failed => {
                let order = self.order_repo.mark_payment_failed(order_id).await?;
                warn!(order_id, "支付失败");
                self.invalidate_order_cache(order_id).await;
                Ok(order)
            }
        }
    }

    async fn require_order(&self, order_id: i64) -> ShopResult<Order> {
        self.order_repo
            .get_by_id(order_id)
            .await?
            .ok_or(ShopError::OrderNotFound { id: order_id })
    }

    fn require_access(&self, actor: &User, order: &Order) -> ShopResult<()> {
        if actor.id == order.customer_id || actor.can_manage_tenant(order.tenant_id) {
            Ok(())
        } else {
            Err(ShopError::Forbidden)
        }
    }

    async fn invalidate_order_cache(&self, order_id: i64) {
        if let Err(e) = self.cache.delete(&cache_keys::order(order_id)).await {
            warn!(order_id, error = %e, "订单缓存失效失败");
        }
    }

    async fn invalidate_product_caches(&self, tenant_id: i64, product_ids: &[i64]) {
        for &id in product_ids {
            if let Err(e) = self.cache.delete(&cache_keys::product(id)).await {
                warn!(product_id = id, error = %e, "商品缓存失效失败");
            }
        }
        if let Err(e) = self
            .cache
            .delete_prefix(&cache_keys::product_prefix(tenant_id))
            .await
        {
            warn!(tenant_id, error = %e, "商品列表缓存失效失败");
        }
    }
}

fn normalize_page(page: i64, page_size: i64) -> (i64, i64) {
    (page.max(1), page_size.clamp(1, 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_page_bounds() {
        assert_eq!(normalize_page(0, 0), (1, 1));
        assert_eq!(normalize_page(-5, 1000), (1, 100));
        assert_eq!(normalize_page(3, 20), (3, 20));
    }
}
