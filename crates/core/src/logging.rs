use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{ShopError, ShopResult};

/// 初始化日志系统
///
/// `format` 支持 "pretty" 和 "json"，级别可被 RUST_LOG 覆盖。
pub fn init_logging(level: &str, format: &str) -> ShopResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shopd={level},shopd_core={level},shopd_infrastructure={level},shopd_dispatcher={level},shopd_worker={level},shopd_api={level}")));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| ShopError::Configuration(format!("初始化日志失败: {e}")))?;
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .map_err(|e| ShopError::Configuration(format!("初始化日志失败: {e}")))?;
        }
    }
    Ok(())
}
