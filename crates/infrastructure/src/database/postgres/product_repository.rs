use async_trait::async_trait;
use sqlx::{PgPool, Row};

use shopd_core::models::{NewProduct, Product, ProductFilter, ProductStats, ProductUpdate};
use shopd_core::traits::ProductRepository;
use shopd_core::{ShopError, ShopResult};

const PRODUCT_COLUMNS: &str = "id, tenant_id, category_id, name, slug, sku, description, \
     base_price, discount_price, stock_quantity, low_stock_threshold, track_inventory, \
     status, is_featured, views_count, sales_count, created_at, updated_at";

pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: &sqlx::postgres::PgRow) -> ShopResult<Product> {
        Ok(Product {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            category_id: row.try_get("category_id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            sku: row.try_get("sku")?,
            description: row.try_get("description")?,
            base_price: row.try_get("base_price")?,
            discount_price: row.try_get("discount_price")?,
            stock_quantity: row.try_get("stock_quantity")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            track_inventory: row.try_get("track_inventory")?,
            status: row.try_get("status")?,
            is_featured: row.try_get("is_featured")?,
            views_count: row.try_get("views_count")?,
            sales_count: row.try_get("sales_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn create(&self, product: &NewProduct) -> ShopResult<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (tenant_id, category_id, name, slug, sku, description,
                base_price, discount_price, stock_quantity, low_stock_threshold,
                track_inventory, status, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.tenant_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.base_price)
        .bind(product.discount_price)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.track_inventory)
        .bind(product.status.as_str())
        .bind(product.is_featured)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_product(&row)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_many(&self, ids: &[i64]) -> ShopResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn list(&self, filter: &ProductFilter) -> ShopResult<Vec<Product>> {
        let page = filter.page.max(1);
        let page_size = filter.page_size.clamp(1, 100);

        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"
        ));
        if let Some(tenant_id) = filter.tenant_id {
            qb.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind((page - 1) * page_size);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update(&self, id: i64, update: &ProductUpdate) -> ShopResult<Product> {
        let mut qb = sqlx::QueryBuilder::new("UPDATE products SET updated_at = now()");
        if let Some(name) = &update.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = &update.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(base_price) = update.base_price {
            qb.push(", base_price = ").push_bind(base_price);
        }
        if let Some(discount_price) = update.discount_price {
            qb.push(", discount_price = ").push_bind(discount_price);
        }
        if let Some(stock_quantity) = update.stock_quantity {
            qb.push(", stock_quantity = ").push_bind(stock_quantity);
        }
        if let Some(threshold) = update.low_stock_threshold {
            qb.push(", low_stock_threshold = ").push_bind(threshold);
        }
        if let Some(track_inventory) = update.track_inventory {
            qb.push(", track_inventory = ").push_bind(track_inventory);
        }
        if let Some(status) = update.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(is_featured) = update.is_featured {
            qb.push(", is_featured = ").push_bind(is_featured);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ShopError::ProductNotFound { id })?;
        Self::row_to_product(&row)
    }

    async fn delete(&self, id: i64) -> ShopResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::ProductNotFound { id });
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, tenant_id: Option<i64>) -> ShopResult<i64> {
        let row = match tenant_id {
            Some(tenant_id) => {
                sqlx::query("SELECT COUNT(*) AS total FROM products WHERE tenant_id = $1")
                    .bind(tenant_id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) AS total FROM products")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.try_get("total")?)
    }

    async fn tenant_stats(&self, tenant_id: i64) -> ShopResult<ProductStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_products,
                   COUNT(*) FILTER (WHERE NOT track_inventory OR stock_quantity > 0)
                       AS in_stock_products,
                   COALESCE(SUM(sales_count), 0)::BIGINT AS total_sales
            FROM products WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ProductStats {
            tenant_id,
            total_products: row.try_get("total_products")?,
            in_stock_products: row.try_get("in_stock_products")?,
            total_sales: row.try_get("total_sales")?,
        })
    }
}
