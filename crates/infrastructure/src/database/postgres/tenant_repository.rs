use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::info;

use shopd_core::models::{NewTenant, Tenant};
use shopd_core::traits::TenantRepository;
use shopd_core::{ShopError, ShopResult};

const TENANT_COLUMNS: &str = "id, name, slug, domain, description, logo_url, owner_id, \
     status, settings, created_at, updated_at";

pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_tenant(row: &sqlx::postgres::PgRow) -> ShopResult<Tenant> {
        Ok(Tenant {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            domain: row.try_get("domain")?,
            description: row.try_get("description")?,
            logo_url: row.try_get("logo_url")?,
            owner_id: row.try_get("owner_id")?,
            status: row.try_get("status")?,
            settings: row.try_get("settings")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn create(&self, tenant: &NewTenant) -> ShopResult<Tenant> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tenants (name, slug, description, owner_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.description)
        .bind(tenant.owner_id)
        .bind(tenant.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_tenant(&row)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Tenant>> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> ShopResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    async fn list(&self, page: i64, page_size: i64) -> ShopResult<Vec<Tenant>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let rows = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_tenant).collect()
    }

    async fn list_ids(&self) -> ShopResult<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
    }

    async fn set_owner(&self, tenant_id: i64, owner_id: i64) -> ShopResult<()> {
        let result = sqlx::query("UPDATE tenants SET owner_id = $1, updated_at = now() WHERE id = $2")
            .bind(owner_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::TenantNotFound { id: tenant_id });
        }
        Ok(())
    }

    /// 级联删除是显式的应用层删除：子表先删，同一事务
    async fn delete(&self, id: i64) -> ShopResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM order_items WHERE order_id IN (SELECT id FROM orders WHERE tenant_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM orders WHERE tenant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM cart_items WHERE product_id IN (SELECT id FROM products WHERE tenant_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM wishlist_items WHERE product_id IN (SELECT id FROM products WHERE tenant_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM discounts WHERE tenant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM products WHERE tenant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM categories WHERE tenant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE tenants SET owner_id = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET tenant_id = NULL, updated_at = now() WHERE tenant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::TenantNotFound { id });
        }

        tx.commit().await?;
        info!(tenant_id = id, "租户及其子数据已删除");
        Ok(())
    }
}
