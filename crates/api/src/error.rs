use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use shopd_core::ShopError;

/// API层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("业务错误: {0}")]
    Shop(#[from] ShopError),

    #[error("请求参数校验失败: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未认证: {0}")]
    Unauthorized(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type) = match &self {
            ApiError::Shop(e) => map_shop_error(e),
            ApiError::Validation(errors) => {
                let details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| "校验失败".to_string())
                            })
                            .collect();
                        format!("{}: {}", field, messages.join(", "))
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    format!("请求参数校验失败: {}", details.join("; ")),
                    "VALIDATION_ERROR",
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, msg.clone(), "UNAUTHORIZED")
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));
        (status, body).into_response()
    }
}

/// 业务错误到HTTP状态码的映射
///
/// 请求路径错误同步返回对应状态码；依赖类错误（数据库/队列/缓存）
/// 不向客户端泄露细节，统一500。
fn map_shop_error(error: &ShopError) -> (StatusCode, String, &'static str) {
    match error {
        ShopError::TenantNotFound { id } => (
            StatusCode::NOT_FOUND,
            format!("租户 {id} 不存在"),
            "TENANT_NOT_FOUND",
        ),
        ShopError::UserNotFound { id } => (
            StatusCode::NOT_FOUND,
            format!("用户 {id} 不存在"),
            "USER_NOT_FOUND",
        ),
        ShopError::ProductNotFound { id } => (
            StatusCode::NOT_FOUND,
            format!("商品 {id} 不存在"),
            "PRODUCT_NOT_FOUND",
        ),
        ShopError::OrderNotFound { id } => (
            StatusCode::NOT_FOUND,
            format!("订单 {id} 不存在"),
            "ORDER_NOT_FOUND",
        ),
        ShopError::CartItemNotFound { id } => (
            StatusCode::NOT_FOUND,
            format!("购物车条目 {id} 不存在"),
            "CART_ITEM_NOT_FOUND",
        ),
        ShopError::InsufficientStock { product_id } => (
            StatusCode::BAD_REQUEST,
            format!("商品 {product_id} 库存不足"),
            "INSUFFICIENT_STOCK",
        ),
        ShopError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            msg.clone(),
            "VALIDATION_ERROR",
        ),
        ShopError::Forbidden => (
            StatusCode::FORBIDDEN,
            "没有操作权限".to_string(),
            "FORBIDDEN",
        ),
        ShopError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "CONFLICT"),
        ShopError::Database(_)
        | ShopError::MessageQueue(_)
        | ShopError::Cache(_)
        | ShopError::Serialization(_)
        | ShopError::Configuration(_)
        | ShopError::InvalidCron { .. }
        | ShopError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "系统内部错误，请稍后重试".to_string(),
            "INTERNAL_ERROR",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = ApiError::Shop(ShopError::OrderNotFound { id: 7 });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_insufficient_stock_maps_to_400() {
        let error = ApiError::Shop(ShopError::InsufficientStock { product_id: 1 });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_forbidden_maps_to_403() {
        let error = ApiError::Shop(ShopError::Forbidden);
        assert_eq!(error.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let error = ApiError::Shop(ShopError::Conflict("重复".into()));
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_dependency_errors_do_not_leak_details() {
        let error = ApiError::Shop(ShopError::MessageQueue("amqp://secret".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let error = ApiError::Unauthorized("缺少认证头".into());
        assert_eq!(error.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
