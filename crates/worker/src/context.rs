use std::sync::Arc;

use shopd_core::services::TaskDispatcher;
use shopd_core::traits::{
    CacheStore, CartRepository, ChatNotifier, EmailSender, MessageQueue, OrderRepository,
    ProductRepository, SmsSender, TenantRepository, UserRepository,
};

/// 任务执行上下文
///
/// 显式注入的依赖集合，进程启动时构造一次，worker运行期间共享。
/// 处理器不持有任何自有状态。
#[derive(Clone)]
pub struct TaskContext {
    pub order_repo: Arc<dyn OrderRepository>,
    pub product_repo: Arc<dyn ProductRepository>,
    pub cart_repo: Arc<dyn CartRepository>,
    pub tenant_repo: Arc<dyn TenantRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub queue: Arc<dyn MessageQueue>,
    pub dispatcher: TaskDispatcher,
    pub cache: Arc<dyn CacheStore>,
    pub email: Arc<dyn EmailSender>,
    pub sms: Arc<dyn SmsSender>,
    pub chat: Arc<dyn ChatNotifier>,
    /// 缓存条目TTL上限（秒）
    pub cache_ttl_seconds: u64,
}
