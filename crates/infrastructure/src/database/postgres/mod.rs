pub mod cart_repository;
pub mod discount_repository;
pub mod order_repository;
pub mod product_repository;
pub mod tenant_repository;
pub mod user_repository;
pub mod wishlist_repository;

pub use cart_repository::PostgresCartRepository;
pub use discount_repository::PostgresDiscountRepository;
pub use order_repository::PostgresOrderRepository;
pub use product_repository::PostgresProductRepository;
pub use tenant_repository::PostgresTenantRepository;
pub use user_repository::PostgresUserRepository;
pub use wishlist_repository::PostgresWishlistRepository;
