//! 数据仓储层接口定义
//!
//! 每个聚合一个仓储接口，接口与实现分离：
//! - PostgreSQL 实现（生产）
//! - 内存实现（测试，见 shopd-testing-utils）
//!
//! 多行写入（订单创建/取消、租户删除）由仓储方法在单个事务内完成，
//! 级联删除是显式的应用层删除，而不是数据库端的隐式级联。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ShopResult;
use crate::models::{
    CartItem, Discount, NewCartItem, NewOrder, NewProduct, NewTenant, NewUser, Order, OrderItem,
    OrderStatus, PaymentStatus, Product, ProductFilter, ProductStats, ProductUpdate, SalesSummary,
    Tenant, User, WishlistItem,
};

/// 租户仓储
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, tenant: &NewTenant) -> ShopResult<Tenant>;

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Tenant>>;

    async fn get_by_slug(&self, slug: &str) -> ShopResult<Option<Tenant>>;

    async fn list(&self, page: i64, page_size: i64) -> ShopResult<Vec<Tenant>>;

    /// 所有租户id（供统计类后台任务遍历）
    async fn list_ids(&self) -> ShopResult<Vec<i64>>;

    /// 设置租户的店主
    async fn set_owner(&self, tenant_id: i64, owner_id: i64) -> ShopResult<()>;

    /// 删除租户及其全部子数据（同一事务内显式删除）
    async fn delete(&self, id: i64) -> ShopResult<()>;
}

/// 用户仓储
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> ShopResult<User>;

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> ShopResult<Option<User>>;
}

/// 商品仓储
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: &NewProduct) -> ShopResult<Product>;

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Product>>;

    /// 批量按id获取（定价计算的输入）
    async fn get_many(&self, ids: &[i64]) -> ShopResult<Vec<Product>>;

    async fn list(&self, filter: &ProductFilter) -> ShopResult<Vec<Product>>;

    async fn update(&self, id: i64, update: &ProductUpdate) -> ShopResult<Product>;

    async fn delete(&self, id: i64) -> ShopResult<()>;

    async fn count(&self, tenant_id: Option<i64>) -> ShopResult<i64>;

    /// 租户维度的商品统计（统计刷新任务）
    async fn tenant_stats(&self, tenant_id: i64) -> ShopResult<ProductStats>;
}

/// 购物车仓储
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// 添加条目；同一商品已存在时合并数量
    async fn add_item(&self, item: &NewCartItem) -> ShopResult<CartItem>;

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<CartItem>>;

    async fn update_quantity(
        &self,
        item_id: i64,
        customer_id: i64,
        quantity: i32,
    ) -> ShopResult<CartItem>;

    async fn remove(&self, item_id: i64, customer_id: i64) -> ShopResult<()>;

    async fn clear_for_customer(&self, customer_id: i64) -> ShopResult<u64>;

    /// 清理长期未更新的废弃购物车，返回删除条数
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> ShopResult<u64>;
}

/// 心愿单仓储
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    async fn add(&self, customer_id: i64, product_id: i64) -> ShopResult<WishlistItem>;

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<WishlistItem>>;

    async fn remove(&self, customer_id: i64, product_id: i64) -> ShopResult<()>;
}

/// 优惠码仓储
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn get_by_code(&self, tenant_id: i64, code: &str) -> ShopResult<Option<Discount>>;

    async fn increment_usage(&self, id: i64) -> ShopResult<()>;
}

/// 订单仓储
///
/// 订单创建是整个系统唯一的复合写入事务：订单 + 行项目 + 库存扣减 +
/// 清空购物车，要么全部成功要么全部回滚。库存扣减使用条件更新
/// （`stock_quantity >= 请求数量` 才生效），并发下单不会超卖。
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: &NewOrder) -> ShopResult<Order>;

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Order>>;

    async fn get_items(&self, order_id: i64) -> ShopResult<Vec<OrderItem>>;

    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>>;

    async fn list_by_tenant(
        &self,
        tenant_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>>;

    /// 取消订单：仅 pending 可取消，反向恢复库存/销量，同一事务
    async fn cancel_order(&self, order_id: i64) -> ShopResult<Order>;

    /// 更新订单状态（状态机校验由服务层完成）
    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> ShopResult<Order>;

    /// 支付成功的幂等转换：仅当尚未支付时生效，返回 None 表示已处理过
    async fn mark_paid_if_unpaid(&self, order_id: i64) -> ShopResult<Option<Order>>;

    /// 标记支付失败（订单状态不变）
    async fn mark_payment_failed(&self, order_id: i64) -> ShopResult<Order>;

    /// 创建时间早于 cutoff 且 pending/未支付 的订单（过期订单取消任务）
    async fn find_unpaid_before(&self, cutoff: DateTime<Utc>) -> ShopResult<Vec<Order>>;

    /// 时间窗口内已成交订单的汇总（排除 cancelled）
    async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ShopResult<SalesSummary>;
}
