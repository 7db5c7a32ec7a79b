use async_trait::async_trait;
use sqlx::{PgPool, Row};

use shopd_core::models::{NewUser, User};
use shopd_core::traits::UserRepository;
use shopd_core::ShopResult;

const USER_COLUMNS: &str =
    "id, email, username, full_name, phone, role, is_active, tenant_id, created_at, updated_at";

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> ShopResult<User> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            full_name: row.try_get("full_name")?,
            phone: row.try_get("phone")?,
            role: row.try_get("role")?,
            is_active: row.try_get("is_active")?,
            tenant_id: row.try_get("tenant_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &NewUser) -> ShopResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (email, username, full_name, phone, role, tenant_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_user(&row)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> ShopResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }
}
