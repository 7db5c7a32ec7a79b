use thiserror::Error;

/// 平台统一错误类型定义
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("租户未找到: {id}")]
    TenantNotFound { id: i64 },

    #[error("用户未找到: {id}")]
    UserNotFound { id: i64 },

    #[error("商品未找到: {id}")]
    ProductNotFound { id: i64 },

    #[error("订单未找到: {id}")]
    OrderNotFound { id: i64 },

    #[error("购物车条目未找到: {id}")]
    CartItemNotFound { id: i64 },

    #[error("商品 {product_id} 库存不足")]
    InsufficientStock { product_id: i64 },

    #[error("校验失败: {0}")]
    Validation(String),

    #[error("没有操作权限")]
    Forbidden,

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("缓存错误: {0}")]
    Cache(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type ShopResult<T> = std::result::Result<T, ShopError>;

impl ShopError {
    /// 判断底层数据库错误是否为唯一约束冲突（订单号/SKU/slug等）
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ShopError::Database(sqlx::Error::Database(e)) => {
                matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_display() {
        let err = ShopError::InsufficientStock { product_id: 42 };
        assert_eq!(format!("{err}"), "商品 42 库存不足");
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!ShopError::Forbidden.is_unique_violation());
        assert!(!ShopError::Conflict("x".into()).is_unique_violation());
    }
}
