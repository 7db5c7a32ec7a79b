use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use shopd_core::models::{Address, Order, OrderItem, OrderStatus};
use shopd_core::services::{CreateOrderRequest, PaymentEvent, RequestedItem};
use shopd_core::traits::{cache_keys, CacheStore};
use shopd_infrastructure::metrics;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{self, PaginatedResponse};
use crate::routes::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderBody {
    #[validate(length(min = 1, message = "订单至少需要一个行项目"))]
    pub items: Vec<RequestedItem>,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub discount_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

fn parse_status(status: Option<&str>) -> ApiResult<Option<OrderStatus>> {
    status
        .map(|s| s.parse::<OrderStatus>().map_err(ApiError::BadRequest))
        .transpose()
}

/// 订单详情（含行项目快照）
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<CreateOrderBody>,
) -> ApiResult<impl IntoResponse> {
    body.validate()?;
    let order = state
        .order_service
        .create_order(
            &actor,
            CreateOrderRequest {
                items: body.items,
                shipping_address: body.shipping_address,
                billing_address: body.billing_address,
                payment_method: body.payment_method,
                notes: body.notes,
                discount_code: body.discount_code,
            },
        )
        .await?;
    metrics::record_order_created(order.total);
    Ok(response::created(order))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = parse_status(query.status.as_deref())?;
    let orders = state
        .order_service
        .list_orders(&actor, status, query.page, query.page_size)
        .await?;
    Ok(response::success(PaginatedResponse::new(
        orders,
        query.page,
        query.page_size,
    )))
}

/// GET /api/orders/admin/all
pub async fn list_tenant_orders(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = parse_status(query.status.as_deref())?;
    let orders = state
        .order_service
        .list_tenant_orders(&actor, status, query.page, query.page_size)
        .await?;
    Ok(response::success(PaginatedResponse::new(
        orders,
        query.page,
        query.page_size,
    )))
}

/// GET /api/orders/{id}
///
/// 订单详情走读穿透缓存；缓存命中后仍然校验归属，缓存永远不是
/// 授权判断的依据。
pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let cache_key = cache_keys::order(order_id);
    if let Ok(Some(cached)) = state.cache.get(&cache_key).await {
        if let Ok(detail) = serde_json::from_str::<OrderDetail>(&cached) {
            if detail.order.customer_id == actor.id || actor.can_manage_tenant(detail.order.tenant_id)
            {
                return Ok(response::success(detail));
            }
            return Err(shopd_core::ShopError::Forbidden.into());
        }
    }

    let (order, items) = state.order_service.get_order(&actor, order_id).await?;
    let detail = OrderDetail { order, items };
    match serde_json::to_string(&detail) {
        Ok(serialized) => {
            if let Err(e) = state
                .cache
                .set(&cache_key, &serialized, state.cache_ttl_seconds)
                .await
            {
                warn!(order_id, error = %e, "写入订单缓存失败");
            }
        }
        Err(e) => warn!(order_id, error = %e, "序列化订单缓存失败"),
    }
    Ok(response::success(detail))
}

/// PATCH /api/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let order = state.order_service.cancel_order(&actor, order_id).await?;
    metrics::record_order_cancelled();
    Ok(response::success(order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// PATCH /api/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> ApiResult<impl IntoResponse> {
    let status = body
        .status
        .parse::<OrderStatus>()
        .map_err(ApiError::BadRequest)?;
    let order = state
        .order_service
        .update_order_status(&actor, order_id, status)
        .await?;
    Ok(response::success(order))
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookBody {
    pub status: String,
    pub transaction_id: Option<String>,
}

/// POST /api/orders/{id}/payment/webhook
///
/// 支付服务商的回调入口，不经过用户认证。成功转换是幂等的，
/// 重复投递不会重复触发通知。
pub async fn payment_webhook(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(body): Json<PaymentWebhookBody>,
) -> ApiResult<impl IntoResponse> {
    let event = match body.status.as_str() {
        "success" | "succeeded" | "paid" => PaymentEvent::Succeeded,
        "failed" | "failure" => PaymentEvent::Failed,
        other => {
            return Err(ApiError::BadRequest(format!("未知的支付状态: {other}")));
        }
    };
    let order = state
        .order_service
        .handle_payment_webhook(order_id, event)
        .await?;
    Ok(response::success(order))
}
