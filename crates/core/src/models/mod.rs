pub mod cart;
pub mod discount;
pub mod message;
pub mod order;
pub mod product;
pub mod tenant;
pub mod user;

pub use cart::{CartItem, NewCartItem, WishlistItem};
pub use discount::{Discount, DiscountKind};
pub use message::{
    queues, route_for, tasks, ChatMessagePayload, OrderTaskPayload, RetryPolicy, SmsPayload,
    TaskMessage, TaskRoute, WelcomeEmailPayload,
};
pub use order::{
    generate_order_number, Address, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus,
    PaymentStatus, SalesSummary, ORDER_NUMBER_PREFIX,
};
pub use product::{
    NewProduct, Product, ProductFilter, ProductStats, ProductStatus, ProductUpdate,
};
pub use tenant::{NewTenant, Tenant, TenantStatus};
pub use user::{NewUser, User, UserRole};
