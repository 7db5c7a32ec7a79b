use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 购物车条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新增购物车条目；同一商品已在购物车时合并数量
#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub customer_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
}

/// 心愿单条目，(customer_id, product_id) 唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub added_at: DateTime<Utc>,
}
