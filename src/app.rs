use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use shopd_api::{create_routes, AppState};
use shopd_core::config::AppConfig;
use shopd_core::services::{OrderService, TaskDispatcher, TenantService};
use shopd_core::traits::{
    CacheStore, CartRepository, DiscountRepository, MessageQueue, OrderRepository,
    ProductRepository, TenantRepository, UserRepository, WishlistRepository,
};
use shopd_dispatcher::BeatScheduler;
use shopd_infrastructure::{
    create_pool, metrics, run_migrations, CacheFactory, MessageQueueFactory,
    PostgresCartRepository, PostgresDiscountRepository, PostgresOrderRepository,
    PostgresProductRepository, PostgresTenantRepository, PostgresUserRepository,
    PostgresWishlistRepository,
};
use shopd_worker::handlers::senders::{LogChatNotifier, LogEmailSender, LogSmsSender};
use shopd_worker::{HandlerRegistry, TaskContext, WorkerService};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行API服务器
    Api,
    /// 仅运行Worker
    Worker,
    /// 仅运行Beat定时调度器
    Beat,
    /// 运行所有组件
    All,
}

/// 主应用程序：组件的显式装配与生命周期
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    queue: Arc<dyn MessageQueue>,
    cache: Arc<dyn CacheStore>,
    tenant_repo: Arc<dyn TenantRepository>,
    user_repo: Arc<dyn UserRepository>,
    product_repo: Arc<dyn ProductRepository>,
    cart_repo: Arc<dyn CartRepository>,
    wishlist_repo: Arc<dyn WishlistRepository>,
    discount_repo: Arc<dyn DiscountRepository>,
    order_repo: Arc<dyn OrderRepository>,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let pool = create_pool(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        run_migrations(&pool).await.context("执行数据库迁移失败")?;

        let queue = MessageQueueFactory::create(&config.message_queue)
            .await
            .context("创建消息队列失败")?;
        let cache = CacheFactory::create(&config.cache)
            .await
            .context("创建缓存失败")?;

        // 多进程部署时每个进程装一次recorder；失败只说明已装过
        let metrics_handle = metrics::install_metrics_recorder().ok();

        Ok(Self {
            config,
            mode,
            queue,
            cache,
            tenant_repo: Arc::new(PostgresTenantRepository::new(pool.clone())),
            user_repo: Arc::new(PostgresUserRepository::new(pool.clone())),
            product_repo: Arc::new(PostgresProductRepository::new(pool.clone())),
            cart_repo: Arc::new(PostgresCartRepository::new(pool.clone())),
            wishlist_repo: Arc::new(PostgresWishlistRepository::new(pool.clone())),
            discount_repo: Arc::new(PostgresDiscountRepository::new(pool.clone())),
            order_repo: Arc::new(PostgresOrderRepository::new(pool)),
            metrics_handle,
        })
    }

    fn dispatcher(&self) -> TaskDispatcher {
        TaskDispatcher::new(Arc::clone(&self.queue))
    }

    fn order_service(&self) -> Arc<OrderService> {
        Arc::new(OrderService::new(
            Arc::clone(&self.order_repo),
            Arc::clone(&self.product_repo),
            Arc::clone(&self.discount_repo),
            self.dispatcher(),
            Arc::clone(&self.cache),
        ))
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        match self.mode {
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::Worker => {
                self.spawn_worker(shutdown_rx).await;
                Ok(())
            }
            AppMode::Beat => {
                self.run_beat(shutdown_rx).await;
                Ok(())
            }
            AppMode::All => {
                let worker_rx = shutdown_rx.resubscribe();
                let beat_rx = shutdown_rx.resubscribe();
                let worker = tokio::spawn({
                    let app = self.worker_service();
                    async move { app.run(worker_rx).await }
                });
                let beat = tokio::spawn({
                    let beat = self.beat_scheduler();
                    async move { beat.run(beat_rx).await }
                });
                let api_result = self.run_api(shutdown_rx).await;
                let _ = worker.await;
                let _ = beat.await;
                api_result
            }
        }
    }

    async fn run_api(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let state = AppState {
            tenant_repo: Arc::clone(&self.tenant_repo),
            user_repo: Arc::clone(&self.user_repo),
            product_repo: Arc::clone(&self.product_repo),
            cart_repo: Arc::clone(&self.cart_repo),
            wishlist_repo: Arc::clone(&self.wishlist_repo),
            order_service: self.order_service(),
            tenant_service: Arc::new(TenantService::new(
                Arc::clone(&self.tenant_repo),
                Arc::clone(&self.user_repo),
                self.dispatcher(),
            )),
            cache: Arc::clone(&self.cache),
            cache_ttl_seconds: self.config.cache.default_ttl_seconds,
            metrics_handle: self.metrics_handle.clone(),
        };

        let app = create_routes(state);
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址 {} 失败", self.config.api.bind_address))?;
        info!("API服务监听 {}", self.config.api.bind_address);

        let mut rx = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
                info!("API服务收到关闭信号");
            })
            .await
            .context("API服务异常退出")?;
        Ok(())
    }

    fn worker_service(&self) -> Arc<WorkerService> {
        let context = Arc::new(TaskContext {
            order_repo: Arc::clone(&self.order_repo),
            product_repo: Arc::clone(&self.product_repo),
            cart_repo: Arc::clone(&self.cart_repo),
            tenant_repo: Arc::clone(&self.tenant_repo),
            user_repo: Arc::clone(&self.user_repo),
            queue: Arc::clone(&self.queue),
            dispatcher: self.dispatcher(),
            cache: Arc::clone(&self.cache),
            email: Arc::new(LogEmailSender),
            sms: Arc::new(LogSmsSender),
            chat: Arc::new(LogChatNotifier),
            cache_ttl_seconds: self.config.cache.default_ttl_seconds,
        });
        let registry = Arc::new(HandlerRegistry::standard());
        Arc::new(WorkerService::from_config(
            &self.config.worker,
            Arc::clone(&self.queue),
            registry,
            context,
        ))
    }

    async fn spawn_worker(&self, shutdown_rx: broadcast::Receiver<()>) {
        self.worker_service().run(shutdown_rx).await;
    }

    fn beat_scheduler(&self) -> BeatScheduler {
        BeatScheduler::with_default_schedule(
            self.dispatcher(),
            Duration::from_secs(self.config.beat.tick_interval_seconds),
        )
    }

    async fn run_beat(&self, shutdown_rx: broadcast::Receiver<()>) {
        self.beat_scheduler().run(shutdown_rx).await;
    }
}
