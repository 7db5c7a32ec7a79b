use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use shopd_core::models::NewCartItem;
use shopd_core::traits::{CartRepository, ProductRepository};
use shopd_core::ShopError;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::response;
use crate::routes::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemBody {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    #[validate(range(min = 1, message = "数量必须大于0"))]
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemBody {
    #[validate(range(min = 1, message = "数量必须大于0"))]
    pub quantity: i32,
}

/// POST /api/cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<AddCartItemBody>,
) -> ApiResult<impl IntoResponse> {
    body.validate()?;
    // 商品必须存在才能加入购物车
    state
        .product_repo
        .get_by_id(body.product_id)
        .await?
        .ok_or(ShopError::ProductNotFound {
            id: body.product_id,
        })?;

    let item = state
        .cart_repo
        .add_item(&NewCartItem {
            customer_id: actor.id,
            product_id: body.product_id,
            variant_id: body.variant_id,
            quantity: body.quantity,
            selected_attributes: body.selected_attributes,
        })
        .await?;
    Ok(response::created(item))
}

/// GET /api/cart
pub async fn get_cart(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let items = state.cart_repo.list_for_customer(actor.id).await?;
    Ok(response::success(items))
}

/// PUT /api/cart/{id}
pub async fn update_cart_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
    Json(body): Json<UpdateCartItemBody>,
) -> ApiResult<impl IntoResponse> {
    body.validate()?;
    let item = state
        .cart_repo
        .update_quantity(item_id, actor.id, body.quantity)
        .await?;
    Ok(response::success(item))
}

/// DELETE /api/cart/{id}
pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.cart_repo.remove(item_id, actor.id).await?;
    Ok(response::no_content())
}

/// DELETE /api/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    state.cart_repo.clear_for_customer(actor.id).await?;
    Ok(response::no_content())
}
