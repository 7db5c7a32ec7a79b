//! 应用配置
//!
//! 配置来源优先级：TOML 配置文件 < `SHOPD__` 前缀的环境变量。
//! 每个组件一个配置段，缺省值在 [`model`] 中定义。

pub mod model;

pub use model::{
    ApiConfig, AppConfig, BeatConfig, CacheBackend, CacheConfig, DatabaseConfig,
    MessageQueueBackend, MessageQueueConfig, RetryConfig, WorkerConfig,
};

use crate::errors::{ShopError, ShopResult};

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 配置文件可以不存在，此时使用默认值加上环境变量覆盖。
    pub fn load(config_path: &str) -> ShopResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHOPD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ShopError::Configuration(format!("构建配置失败: {e}")))?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ShopError::Configuration(format!("解析配置失败: {e}")))?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// 校验配置的合法性
    pub fn validate(&self) -> ShopResult<()> {
        if self.database.url.is_empty() {
            return Err(ShopError::Configuration("database.url 不能为空".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ShopError::Configuration(
                "database.max_connections 必须大于0".into(),
            ));
        }
        if self.worker.max_concurrent_tasks == 0 {
            return Err(ShopError::Configuration(
                "worker.max_concurrent_tasks 必须大于0".into(),
            ));
        }
        if self.worker.soft_time_limit_seconds > self.worker.hard_time_limit_seconds {
            return Err(ShopError::Configuration(
                "worker.soft_time_limit_seconds 不能大于 hard_time_limit_seconds".into(),
            ));
        }
        if self.beat.tick_interval_seconds == 0 {
            return Err(ShopError::Configuration(
                "beat.tick_interval_seconds 必须大于0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.worker.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_soft_limit_above_hard_limit_rejected() {
        let mut config = AppConfig::default();
        config.worker.soft_time_limit_seconds = 900;
        config.worker.hard_time_limit_seconds = 600;
        assert!(config.validate().is_err());
    }
}
