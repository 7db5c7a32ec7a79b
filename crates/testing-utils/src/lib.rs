//! 测试工具
//!
//! 内存版mock仓储/队列和测试数据构造器，单元测试和集成测试
//! 不依赖真实数据库与Broker即可驱动完整的订单/任务管线。

pub mod builders;
pub mod mocks;

pub use builders::{
    test_address, DiscountBuilder, ProductBuilder, TenantBuilder, UserBuilder,
};
pub use mocks::{
    unique_violation, FailingMessageQueue, InMemoryStore, MockCartRepository,
    MockDiscountRepository, MockOrderRepository, MockProductRepository, MockTenantRepository,
    MockUserRepository, MockWishlistRepository, RecordingChatNotifier, RecordingEmailSender,
    RecordingSmsSender,
};
