//! 数据库连接与迁移

pub mod postgres;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use shopd_core::config::DatabaseConfig;
use shopd_core::{ShopError, ShopResult};

/// 内嵌的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> ShopResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "数据库连接池已创建");
    Ok(pool)
}

/// 应用数据库迁移
pub async fn run_migrations(pool: &PgPool) -> ShopResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| ShopError::Configuration(format!("数据库迁移失败: {e}")))?;
    info!("数据库迁移完成");
    Ok(())
}
