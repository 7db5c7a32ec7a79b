use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use shopd_core::models::{CartItem, NewCartItem};
use shopd_core::traits::CartRepository;
use shopd_core::{ShopError, ShopResult};

const CART_COLUMNS: &str = "id, customer_id, product_id, variant_id, quantity, \
     selected_attributes, added_at, updated_at";

pub struct PostgresCartRepository {
    pool: PgPool,
}

impl PostgresCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &sqlx::postgres::PgRow) -> ShopResult<CartItem> {
        Ok(CartItem {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            product_id: row.try_get("product_id")?,
            variant_id: row.try_get("variant_id")?,
            quantity: row.try_get("quantity")?,
            selected_attributes: row.try_get("selected_attributes")?,
            added_at: row.try_get("added_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    async fn add_item(&self, item: &NewCartItem) -> ShopResult<CartItem> {
        // 同一商品（含同一变体）已在购物车时合并数量
        let existing = sqlx::query(&format!(
            "UPDATE cart_items SET quantity = quantity + $1, updated_at = now() \
             WHERE customer_id = $2 AND product_id = $3 AND variant_id IS NOT DISTINCT FROM $4 \
             RETURNING {CART_COLUMNS}"
        ))
        .bind(item.quantity)
        .bind(item.customer_id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = existing {
            return Self::row_to_item(&row);
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_items (customer_id, product_id, variant_id, quantity, selected_attributes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(item.customer_id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(&item.selected_attributes)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_item(&row)
    }

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<CartItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE customer_id = $1 ORDER BY added_at"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn update_quantity(
        &self,
        item_id: i64,
        customer_id: i64,
        quantity: i32,
    ) -> ShopResult<CartItem> {
        let row = sqlx::query(&format!(
            "UPDATE cart_items SET quantity = $1, updated_at = now() \
             WHERE id = $2 AND customer_id = $3 RETURNING {CART_COLUMNS}"
        ))
        .bind(quantity)
        .bind(item_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ShopError::CartItemNotFound { id: item_id })?;
        Self::row_to_item(&row)
    }

    async fn remove(&self, item_id: i64, customer_id: i64) -> ShopResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND customer_id = $2")
            .bind(item_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CartItemNotFound { id: item_id });
        }
        Ok(())
    }

    async fn clear_for_customer(&self, customer_id: i64) -> ShopResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> ShopResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
