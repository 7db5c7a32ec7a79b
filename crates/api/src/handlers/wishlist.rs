use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use shopd_core::traits::{ProductRepository, WishlistRepository};
use shopd_core::ShopError;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::response;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddWishlistBody {
    pub product_id: i64,
}

/// POST /api/wishlist
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<AddWishlistBody>,
) -> ApiResult<impl IntoResponse> {
    state
        .product_repo
        .get_by_id(body.product_id)
        .await?
        .ok_or(ShopError::ProductNotFound {
            id: body.product_id,
        })?;
    let item = state.wishlist_repo.add(actor.id, body.product_id).await?;
    Ok(response::created(item))
}

/// GET /api/wishlist
pub async fn get_wishlist(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let items = state.wishlist_repo.list_for_customer(actor.id).await?;
    Ok(response::success(items))
}

/// DELETE /api/wishlist/{product_id}
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(product_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.wishlist_repo.remove(actor.id, product_id).await?;
    Ok(response::no_content())
}
