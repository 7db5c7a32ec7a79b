use async_trait::async_trait;
use sqlx::{PgPool, Row};

use shopd_core::models::WishlistItem;
use shopd_core::traits::WishlistRepository;
use shopd_core::ShopResult;

pub struct PostgresWishlistRepository {
    pool: PgPool,
}

impl PostgresWishlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &sqlx::postgres::PgRow) -> ShopResult<WishlistItem> {
        Ok(WishlistItem {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            product_id: row.try_get("product_id")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

#[async_trait]
impl WishlistRepository for PostgresWishlistRepository {
    async fn add(&self, customer_id: i64, product_id: i64) -> ShopResult<WishlistItem> {
        // 重复加入是幂等的
        let row = sqlx::query(
            r#"
            INSERT INTO wishlist_items (customer_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (customer_id, product_id)
                DO UPDATE SET customer_id = EXCLUDED.customer_id
            RETURNING id, customer_id, product_id, added_at
            "#,
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_item(&row)
    }

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<WishlistItem>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, product_id, added_at FROM wishlist_items \
             WHERE customer_id = $1 ORDER BY added_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn remove(&self, customer_id: i64, product_id: i64) -> ShopResult<()> {
        sqlx::query("DELETE FROM wishlist_items WHERE customer_id = $1 AND product_id = $2")
            .bind(customer_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
