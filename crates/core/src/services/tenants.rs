//! 租户开店服务
//!
//! 创建店铺的同时创建店主账号，随后尽力而为地发送欢迎邮件。

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::errors::{ShopError, ShopResult};
use crate::models::{tasks, NewTenant, NewUser, TaskMessage, Tenant, TenantStatus, User, UserRole};
use crate::services::dispatch::TaskDispatcher;
use crate::traits::{TenantRepository, UserRepository};

/// 开店请求
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner_email: String,
    pub owner_full_name: String,
}

pub struct TenantService {
    tenant_repo: Arc<dyn TenantRepository>,
    user_repo: Arc<dyn UserRepository>,
    dispatcher: TaskDispatcher,
}

impl TenantService {
    pub fn new(
        tenant_repo: Arc<dyn TenantRepository>,
        user_repo: Arc<dyn UserRepository>,
        dispatcher: TaskDispatcher,
    ) -> Self {
        Self {
            tenant_repo,
            user_repo,
            dispatcher,
        }
    }

    /// 创建租户和店主账号
    pub async fn create_tenant(&self, req: CreateTenantRequest) -> ShopResult<(Tenant, User)> {
        if self.tenant_repo.get_by_slug(&req.slug).await?.is_some() {
            return Err(ShopError::Conflict(format!("店铺slug {} 已被占用", req.slug)));
        }
        if self.user_repo.get_by_email(&req.owner_email).await?.is_some() {
            return Err(ShopError::Conflict(format!(
                "邮箱 {} 已被注册",
                req.owner_email
            )));
        }

        let tenant = self
            .tenant_repo
            .create(&NewTenant {
                name: req.name.clone(),
                slug: req.slug.clone(),
                description: req.description.clone(),
                owner_id: None,
                status: TenantStatus::Trial,
            })
            .await?;

        let owner = self
            .user_repo
            .create(&NewUser {
                email: req.owner_email.clone(),
                username: None,
                full_name: Some(req.owner_full_name.clone()),
                phone: None,
                role: UserRole::TenantOwner,
                tenant_id: Some(tenant.id),
            })
            .await?;
        self.tenant_repo.set_owner(tenant.id, owner.id).await?;

        info!(tenant_id = tenant.id, slug = %tenant.slug, "店铺创建成功");

        self.dispatcher
            .dispatch(TaskMessage::new(
                tasks::SEND_WELCOME_EMAIL,
                json!({ "email": owner.email, "full_name": req.owner_full_name }),
            ))
            .await;

        Ok((tenant, owner))
    }
}
