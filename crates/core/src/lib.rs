pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod traits;

pub use config::AppConfig;
pub use errors::{ShopError, ShopResult};
pub use models::{
    queues, route_for, tasks, Address, CartItem, Discount, DiscountKind, NewCartItem, NewOrder,
    NewOrderItem, NewProduct, NewTenant, NewUser, Order, OrderItem, OrderStatus, PaymentStatus,
    Product, ProductFilter, ProductStats, ProductStatus, ProductUpdate, RetryPolicy, SalesSummary,
    TaskMessage, TaskRoute, Tenant, TenantStatus, User, UserRole, WishlistItem,
};
pub use services::{
    CreateOrderRequest, CreateTenantRequest, OrderService, PaymentEvent, TaskDispatcher,
    TenantService,
};
pub use traits::{
    cache_keys, CacheStore, CartRepository, ChatNotifier, DiscountRepository, EmailSender,
    MessageQueue, OrderRepository, ProductRepository, SmsSender, TenantRepository, UserRepository,
    WishlistRepository,
};
