pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod tenants;
pub mod wishlist;
