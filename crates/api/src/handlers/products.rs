use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use validator::Validate;

use shopd_core::models::{NewProduct, Product, ProductFilter, ProductStatus, ProductUpdate};
use shopd_core::traits::{cache_keys, CacheStore, ProductRepository};
use shopd_core::ShopError;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{self, PaginatedResponse};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub tenant_id: Option<i64>,
    pub category_id: Option<i64>,
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

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductBody {
    #[validate(length(min = 1, max = 500, message = "商品名长度非法"))]
    pub name: String,
    #[validate(length(min = 1, max = 500, message = "slug长度非法"))]
    pub slug: String,
    #[validate(length(min = 1, max = 100, message = "SKU长度非法"))]
    pub sku: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "价格不能为负"))]
    pub base_price: f64,
    pub discount_price: Option<f64>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i32,
    #[serde(default = "default_track_inventory")]
    pub track_inventory: bool,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_low_stock_threshold() -> i32 {
    10
}

fn default_track_inventory() -> bool {
    true
}

/// 字段缺失 -> None（不修改）；字段为null -> Some(None)（清除）
fn deserialize_double_option<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    Option::<f64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<f64>,
    /// 外层None表示不修改，显式null表示清除折扣价
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub discount_price: Option<Option<f64>>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub track_inventory: Option<bool>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<ProductStatus>().map_err(ApiError::BadRequest))
        .transpose()?;
    let products = state
        .product_repo
        .list(&ProductFilter {
            tenant_id: query.tenant_id,
            category_id: query.category_id,
            status,
            page: query.page,
            page_size: query.page_size,
        })
        .await?;
    Ok(response::success(PaginatedResponse::new(
        products,
        query.page,
        query.page_size,
    )))
}

/// GET /api/products/{id}（读穿透缓存）
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // 浏览计数走缓存计数器，失败不影响请求
    if let Err(e) = state
        .cache
        .incr(&format!("views:product:{product_id}"), 1)
        .await
    {
        warn!(product_id, error = %e, "浏览计数更新失败");
    }

    let cache_key = cache_keys::product(product_id);
    if let Ok(Some(cached)) = state.cache.get(&cache_key).await {
        if let Ok(product) = serde_json::from_str::<Product>(&cached) {
            return Ok(response::success(product));
        }
    }

    let product = state
        .product_repo
        .get_by_id(product_id)
        .await?
        .ok_or(ShopError::ProductNotFound { id: product_id })?;

    match serde_json::to_string(&product) {
        Ok(serialized) => {
            if let Err(e) = state
                .cache
                .set(&cache_key, &serialized, state.cache_ttl_seconds)
                .await
            {
                warn!(product_id, error = %e, "写入商品缓存失败");
            }
        }
        Err(e) => warn!(product_id, error = %e, "序列化商品缓存失败"),
    }
    Ok(response::success(product))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<CreateProductBody>,
) -> ApiResult<impl IntoResponse> {
    body.validate()?;
    let tenant_id = actor
        .tenant_id
        .filter(|&t| actor.can_manage_tenant(t))
        .ok_or(ShopError::Forbidden)?;

    if let Some(discount_price) = body.discount_price {
        if discount_price >= body.base_price {
            return Err(ShopError::Validation("折扣价必须低于原价".into()).into());
        }
    }

    let product = state
        .product_repo
        .create(&NewProduct {
            tenant_id,
            category_id: body.category_id,
            name: body.name,
            slug: body.slug,
            sku: body.sku,
            description: body.description,
            base_price: body.base_price,
            discount_price: body.discount_price,
            stock_quantity: body.stock_quantity,
            low_stock_threshold: body.low_stock_threshold,
            track_inventory: body.track_inventory,
            status: ProductStatus::Draft,
            is_featured: body.is_featured,
        })
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Shop(ShopError::Conflict("SKU已存在".into()))
            } else {
                ApiError::Shop(e)
            }
        })?;

    invalidate_product_caches(&state, tenant_id, product.id).await;
    Ok(response::created(product))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(product_id): Path<i64>,
    Json(body): Json<UpdateProductBody>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .product_repo
        .get_by_id(product_id)
        .await?
        .ok_or(ShopError::ProductNotFound { id: product_id })?;
    if !actor.can_manage_tenant(existing.tenant_id) {
        return Err(ShopError::Forbidden.into());
    }

    let new_base = body.base_price.unwrap_or(existing.base_price);
    let new_discount = match body.discount_price {
        Some(value) => value,
        None => existing.discount_price,
    };
    if let Some(discount) = new_discount {
        if discount >= new_base {
            return Err(ShopError::Validation("折扣价必须低于原价".into()).into());
        }
    }

    let status = body
        .status
        .as_deref()
        .map(|s| s.parse::<ProductStatus>().map_err(ApiError::BadRequest))
        .transpose()?;

    let updated = state
        .product_repo
        .update(
            product_id,
            &ProductUpdate {
                name: body.name,
                description: body.description,
                base_price: body.base_price,
                discount_price: body.discount_price,
                stock_quantity: body.stock_quantity,
                low_stock_threshold: body.low_stock_threshold,
                track_inventory: body.track_inventory,
                status,
                is_featured: body.is_featured,
            },
        )
        .await?;

    invalidate_product_caches(&state, existing.tenant_id, product_id).await;
    Ok(response::success(updated))
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(product_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .product_repo
        .get_by_id(product_id)
        .await?
        .ok_or(ShopError::ProductNotFound { id: product_id })?;
    if !actor.can_manage_tenant(existing.tenant_id) {
        return Err(ShopError::Forbidden.into());
    }

    state.product_repo.delete(product_id).await?;
    invalidate_product_caches(&state, existing.tenant_id, product_id).await;
    Ok(response::no_content())
}

/// 实体写入后的主动缓存失效
async fn invalidate_product_caches(state: &AppState, tenant_id: i64, product_id: i64) {
    if let Err(e) = state.cache.delete(&cache_keys::product(product_id)).await {
        warn!(product_id, error = %e, "商品缓存失效失败");
    }
    if let Err(e) = state
        .cache
        .delete_prefix(&cache_keys::product_prefix(tenant_id))
        .await
    {
        warn!(tenant_id, error = %e, "商品列表缓存失效失败");
    }
}
