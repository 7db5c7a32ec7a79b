use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 商品状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProductStatus::Draft),
            "active" => Ok(ProductStatus::Active),
            "archived" => Ok(ProductStatus::Archived),
            _ => Err(format!("无效的商品状态: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for ProductStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ProductStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// 商品
///
/// 库存相关字段的修改只发生在订单创建（扣减库存、累加销量）和
/// 订单取消（反向恢复）两条路径上，且都在订单事务内完成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub tenant_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub discount_price: Option<f64>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub views_count: i32,
    pub sales_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 生效单价：折扣价低于原价时取折扣价
    pub fn unit_price(&self) -> f64 {
        match self.discount_price {
            Some(discount) if discount < self.base_price => discount,
            _ => self.base_price,
        }
    }

    /// 是否有足够库存满足请求数量（不追踪库存的商品恒为真）
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        !self.track_inventory || self.stock_quantity >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity <= self.low_stock_threshold
    }
}

/// 新建商品
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub tenant_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub discount_price: Option<f64>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub status: ProductStatus,
    pub is_featured: bool,
}

/// 商品字段更新（None表示不修改）
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<f64>,
    pub discount_price: Option<Option<f64>>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub track_inventory: Option<bool>,
    pub status: Option<ProductStatus>,
    pub is_featured: Option<bool>,
}

/// 商品列表查询条件
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub tenant_id: Option<i64>,
    pub category_id: Option<i64>,
    pub status: Option<ProductStatus>,
    pub page: i64,
    pub page_size: i64,
}

/// 租户维度的商品统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStats {
    pub tenant_id: i64,
    pub total_products: i64,
    pub in_stock_products: i64,
    pub total_sales: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(base: f64, discount: Option<f64>) -> Product {
        Product {
            id: 1,
            tenant_id: 1,
            category_id: None,
            name: "测试商品".to_string(),
            slug: "test".to_string(),
            sku: "SKU-1".to_string(),
            description: None,
            base_price: base,
            discount_price: discount,
            stock_quantity: 10,
            low_stock_threshold: 5,
            track_inventory: true,
            status: ProductStatus::Active,
            is_featured: false,
            views_count: 0,
            sales_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_price_prefers_lower_discount() {
        assert_eq!(product(100.0, Some(80.0)).unit_price(), 80.0);
        assert_eq!(product(100.0, None).unit_price(), 100.0);
        // 折扣价不低于原价时无效
        assert_eq!(product(100.0, Some(120.0)).unit_price(), 100.0);
    }

    #[test]
    fn test_untracked_product_always_has_stock() {
        let mut p = product(10.0, None);
        p.track_inventory = false;
        p.stock_quantity = 0;
        assert!(p.has_stock_for(999));
    }

    #[test]
    fn test_tracked_product_stock_check() {
        let p = product(10.0, None);
        assert!(p.has_stock_for(10));
        assert!(!p.has_stock_for(11));
    }
}
