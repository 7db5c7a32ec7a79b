use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 订单号前缀，对外契约的一部分
pub const ORDER_NUMBER_PREFIX: &str = "ORD-";

/// 订单状态
///
/// 状态只允许向前推进（按 [`OrderStatus::rank`] 的顺序），唯一的例外是
/// `pending` 订单可以通过取消路径进入 `cancelled`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Refunded => 5,
            // cancelled 是终态，不参与向前推进的排序
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    /// 状态机校验：只允许向前推进，`cancelled` 只能经由取消路径进入
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return false;
        }
        if matches!(next, OrderStatus::Cancelled) {
            return false;
        }
        next.rank() > self.rank()
    }

    /// 是否可取消（仅 pending 订单）
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            _ => Err(format!("无效的订单状态: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for OrderStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// 支付状态
///
/// 封闭枚举，在边界处校验，不接受自由文本。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(format!("无效的支付状态: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for PaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// 结构化收货/账单地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub full_name: String,
    pub phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

/// 订单聚合根
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub tenant_id: i64,
    pub customer_id: i64,
    pub order_number: String,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub shipping_cost: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub discount_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单行项目
///
/// `product_name` 和 `product_attributes` 是下单时刻的商品快照，
/// 创建后不再更新，商品后续变更不影响历史订单。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub product_name: String,
    pub product_attributes: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
}

/// 待持久化的订单（创建事务的输入）
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tenant_id: i64,
    pub customer_id: i64,
    pub order_number: String,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub shipping_cost: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub discount_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// 待持久化的订单行项目
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub product_name: String,
    pub product_attributes: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
}

/// 生成订单号：固定前缀 + 8位大写十六进制
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}{}", ORDER_NUMBER_PREFIX, &hex[..8])
}

/// 一段时间内的销售汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSummary {
    pub order_count: i64,
    pub total_revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 12);
        let suffix = &number[4..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_status_moves_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_cancelled_only_via_cancellation_path() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(!OrderStatus::Confirmed.is_cancellable());
    }

    #[test]
    fn test_terminal_states_do_not_transition() {
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
    }
}
