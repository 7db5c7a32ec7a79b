pub mod cache;
pub mod database;
pub mod in_memory_queue;
pub mod message_queue;
pub mod metrics;
pub mod queue_factory;

pub use cache::{CacheFactory, InMemoryCache, RedisCache};
pub use database::postgres::{
    PostgresCartRepository, PostgresDiscountRepository, PostgresOrderRepository,
    PostgresProductRepository, PostgresTenantRepository, PostgresUserRepository,
    PostgresWishlistRepository,
};
pub use database::{create_pool, run_migrations, MIGRATOR};
pub use in_memory_queue::InMemoryMessageQueue;
pub use message_queue::RabbitMqMessageQueue;
pub use queue_factory::MessageQueueFactory;
