use async_trait::async_trait;
use sqlx::{PgPool, Row};

use shopd_core::models::Discount;
use shopd_core::traits::DiscountRepository;
use shopd_core::ShopResult;

const DISCOUNT_COLUMNS: &str = "id, tenant_id, code, name, kind, value, min_purchase_amount, \
     max_discount_amount, usage_limit, usage_count, valid_from, valid_to, is_active, \
     created_at, updated_at";

pub struct PostgresDiscountRepository {
    pool: PgPool,
}

impl PostgresDiscountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_discount(row: &sqlx::postgres::PgRow) -> ShopResult<Discount> {
        Ok(Discount {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            value: row.try_get("value")?,
            min_purchase_amount: row.try_get("min_purchase_amount")?,
            max_discount_amount: row.try_get("max_discount_amount")?,
            usage_limit: row.try_get("usage_limit")?,
            usage_count: row.try_get("usage_count")?,
            valid_from: row.try_get("valid_from")?,
            valid_to: row.try_get("valid_to")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DiscountRepository for PostgresDiscountRepository {
    async fn get_by_code(&self, tenant_id: i64, code: &str) -> ShopResult<Option<Discount>> {
        let row = sqlx::query(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE tenant_id = $1 AND code = $2"
        ))
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_discount).transpose()
    }

    async fn increment_usage(&self, id: i64) -> ShopResult<()> {
        sqlx::query(
            "UPDATE discounts SET usage_count = usage_count + 1, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
