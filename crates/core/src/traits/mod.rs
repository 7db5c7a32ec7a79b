pub mod cache;
pub mod message_queue;
pub mod repository;
pub mod senders;

pub use cache::{keys as cache_keys, CacheStore};
pub use message_queue::MessageQueue;
pub use repository::{
    CartRepository, DiscountRepository, OrderRepository, ProductRepository, TenantRepository,
    UserRepository, WishlistRepository,
};
pub use senders::{ChatNotifier, EmailSender, SmsSender};
