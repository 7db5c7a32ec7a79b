use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shopd_core::services::{OrderService, TenantService};
use shopd_core::traits::{
    CacheStore, CartRepository, ProductRepository, TenantRepository, UserRepository,
    WishlistRepository,
};

use crate::handlers::{cart, health, orders, products, tenants, wishlist};

/// API应用状态：显式注入的依赖集合
#[derive(Clone)]
pub struct AppState {
    pub tenant_repo: Arc<dyn TenantRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub product_repo: Arc<dyn ProductRepository>,
    pub cart_repo: Arc<dyn CartRepository>,
    pub wishlist_repo: Arc<dyn WishlistRepository>,
    pub order_service: Arc<OrderService>,
    pub tenant_service: Arc<TenantService>,
    pub cache: Arc<dyn CacheStore>,
    pub cache_ttl_seconds: u64,
    pub metrics_handle: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查与指标
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // 订单
        .route("/api/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/orders/admin/all", get(orders::list_tenant_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/cancel", patch(orders::cancel_order))
        .route("/api/orders/{id}/status", patch(orders::update_order_status))
        .route("/api/orders/{id}/payment/webhook", post(orders::payment_webhook))
        // 购物车
        .route("/api/cart", get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart))
        .route("/api/cart/{id}", put(cart::update_cart_item).delete(cart::remove_from_cart))
        // 心愿单
        .route("/api/wishlist", get(wishlist::get_wishlist).post(wishlist::add_to_wishlist))
        .route("/api/wishlist/{product_id}", delete(wishlist::remove_from_wishlist))
        // 商品
        .route("/api/products", get(products::list_products).post(products::create_product))
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        // 租户
        .route("/api/tenants", get(tenants::list_tenants).post(tenants::create_tenant))
        .route(
            "/api/tenants/{id}",
            get(tenants::get_tenant).delete(tenants::delete_tenant),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
