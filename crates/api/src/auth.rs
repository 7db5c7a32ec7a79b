//! 请求方身份提取
//!
//! 凭证签发（JWT等）不在本服务范围内，网关完成认证后通过
//! `X-User-Id` 头传递用户身份，这里据此加载用户并做活跃检查。
//! 接入真实认证时替换此提取器即可。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use shopd_core::models::User;
use shopd_core::traits::UserRepository;

use crate::error::ApiError;
use crate::routes::AppState;

/// 当前请求的用户
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id: i64 = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ApiError::Unauthorized("缺少或无效的 X-User-Id 头".into()))?;

        let user = state
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(format!("用户 {user_id} 不存在")))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("账号已停用".into()));
        }
        Ok(CurrentUser(user))
    }
}
