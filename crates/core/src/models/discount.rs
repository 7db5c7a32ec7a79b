use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 优惠类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
    FreeShipping,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
            DiscountKind::FreeShipping => "free_shipping",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountKind::Percentage),
            "fixed" => Ok(DiscountKind::Fixed),
            "free_shipping" => Ok(DiscountKind::FreeShipping),
            _ => Err(format!("无效的优惠类型: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for DiscountKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DiscountKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// 优惠码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: i64,
    pub tenant_id: i64,
    pub code: String,
    pub name: String,
    pub kind: DiscountKind,
    pub value: f64,
    pub min_purchase_amount: f64,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// 当前时间是否处于有效期内
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_to
    }

    /// 是否还有剩余使用次数
    pub fn has_usage_left(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.usage_count < limit,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(limit: Option<i32>, used: i32) -> Discount {
        let now = Utc::now();
        Discount {
            id: 1,
            tenant_id: 1,
            code: "SAVE10".to_string(),
            name: "满减".to_string(),
            kind: DiscountKind::Percentage,
            value: 10.0,
            min_purchase_amount: 0.0,
            max_discount_amount: None,
            usage_limit: limit,
            usage_count: used,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_usage_limit() {
        assert!(discount(None, 1000).has_usage_left());
        assert!(discount(Some(5), 4).has_usage_left());
        assert!(!discount(Some(5), 5).has_usage_left());
    }

    #[test]
    fn test_validity_window() {
        let d = discount(None, 0);
        assert!(d.is_within_window(Utc::now()));
        assert!(!d.is_within_window(Utc::now() + Duration::days(2)));
        assert!(!d.is_within_window(Utc::now() - Duration::days(2)));
    }
}
