use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use shopd_core::models::{Tenant, User};
use shopd_core::services::CreateTenantRequest;
use shopd_core::traits::TenantRepository;
use shopd_core::ShopError;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{self, PaginatedResponse};
use crate::routes::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantBody {
    #[validate(length(min = 3, max = 255, message = "店铺名至少3个字符"))]
    pub name: String,
    #[validate(length(min = 3, max = 255, message = "slug至少3个字符"))]
    pub slug: String,
    pub description: Option<String>,
    #[validate(email(message = "店主邮箱格式非法"))]
    pub owner_email: String,
    #[validate(length(min = 1, message = "店主姓名不能为空"))]
    pub owner_full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TenantListQuery {
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

#[derive(Debug, Serialize)]
pub struct TenantCreated {
    pub tenant: Tenant,
    pub owner: User,
}

/// POST /api/tenants（开店）
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(body): Json<CreateTenantBody>,
) -> ApiResult<impl IntoResponse> {
    body.validate()?;
    let (tenant, owner) = state
        .tenant_service
        .create_tenant(CreateTenantRequest {
            name: body.name,
            slug: body.slug,
            description: body.description,
            owner_email: body.owner_email,
            owner_full_name: body.owner_full_name,
        })
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Shop(ShopError::Conflict("slug或邮箱已被占用".into()))
            } else {
                ApiError::Shop(e)
            }
        })?;
    Ok(response::created(TenantCreated { tenant, owner }))
}

/// GET /api/tenants
pub async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<TenantListQuery>,
) -> ApiResult<impl IntoResponse> {
    let tenants = state.tenant_repo.list(query.page, query.page_size).await?;
    Ok(response::success(PaginatedResponse::new(
        tenants,
        query.page,
        query.page_size,
    )))
}

/// GET /api/tenants/{id}
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state
        .tenant_repo
        .get_by_id(tenant_id)
        .await?
        .ok_or(ShopError::TenantNotFound { id: tenant_id })?;
    Ok(response::success(tenant))
}

/// DELETE /api/tenants/{id}（关店，显式删除全部子数据）
pub async fn delete_tenant(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(tenant_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // 仅超管或该店铺的店主可以关店
    let allowed = matches!(actor.role, shopd_core::models::UserRole::SuperAdmin)
        || (matches!(actor.role, shopd_core::models::UserRole::TenantOwner)
            && actor.tenant_id == Some(tenant_id));
    if !allowed {
        return Err(ShopError::Forbidden.into());
    }
    state.tenant_repo.delete(tenant_id).await?;
    Ok(response::no_content())
}
