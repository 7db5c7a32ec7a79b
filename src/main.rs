use anyhow::{Context, Result};
use clap::{Arg, Command};
use tracing::info;

use shopd_core::config::AppConfig;
use shopd_core::logging;

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::ShutdownManager;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("shopd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("多租户电商平台后端")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/shopd.toml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["api", "worker", "beat", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let mode_str = matches.get_one::<String>("mode").unwrap();
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    logging::init_logging(log_level, log_format).context("初始化日志失败")?;

    info!("启动多租户电商平台后端");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    let config = AppConfig::load(config_path).context("加载配置失败")?;
    let mode = match mode_str.as_str() {
        "api" => AppMode::Api,
        "worker" => AppMode::Worker,
        "beat" => AppMode::Beat,
        _ => AppMode::All,
    };

    let shutdown = ShutdownManager::new();
    let app = Application::new(config, mode).await.context("初始化应用失败")?;

    let shutdown_handle = shutdown.clone();
    tokio::spawn(async move {
        shutdown_handle.listen_for_signals().await;
    });

    app.run(shutdown.subscribe()).await.context("应用运行失败")?;

    info!("应用已退出");
    Ok(())
}
