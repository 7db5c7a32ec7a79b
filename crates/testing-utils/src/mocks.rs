//! 内存mock实现
//!
//! 所有仓储共享一个 [`InMemoryStore`]，内部用单把锁模拟数据库的
//! 事务边界：订单创建在持锁期间完成校验与扣减，两个并发下单不会
//! 同时通过同一件商品的库存检查。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopd_core::models::{
    CartItem, Discount, NewCartItem, NewOrder, NewProduct, NewTenant, NewUser, Order, OrderItem,
    OrderStatus, PaymentStatus, Product, ProductFilter, ProductStats, ProductUpdate, SalesSummary,
    TaskMessage, Tenant, User, WishlistItem,
};
use shopd_core::traits::{
    CartRepository, ChatNotifier, DiscountRepository, EmailSender, MessageQueue, OrderRepository,
    ProductRepository, SmsSender, TenantRepository, UserRepository, WishlistRepository,
};
use shopd_core::{ShopError, ShopResult};

/// 模拟Postgres唯一约束冲突的数据库错误
#[derive(Debug)]
pub struct FakeUniqueViolation(pub String);

impl std::fmt::Display for FakeUniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unique violation: {}", self.0)
    }
}

impl std::error::Error for FakeUniqueViolation {}

impl sqlx::error::DatabaseError for FakeUniqueViolation {
    fn message(&self) -> &str {
        &self.0
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }
}

/// 构造一个会被 `ShopError::is_unique_violation` 识别的错误
pub fn unique_violation(message: &str) -> ShopError {
    ShopError::Database(sqlx::Error::Database(Box::new(FakeUniqueViolation(
        message.to_string(),
    ))))
}

#[derive(Default)]
struct StoreInner {
    next_id: i64,
    tenants: HashMap<i64, Tenant>,
    users: HashMap<i64, User>,
    products: HashMap<i64, Product>,
    discounts: HashMap<i64, Discount>,
    cart_items: HashMap<i64, CartItem>,
    wishlist: Vec<WishlistItem>,
    orders: HashMap<i64, Order>,
    order_items: HashMap<i64, Vec<OrderItem>>,
}

impl StoreInner {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump_next_id(&mut self, id: i64) {
        if id > self.next_id {
            self.next_id = id;
        }
    }
}

/// 共享的内存数据存储
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap()
    }

    pub fn seed_tenant(&self, tenant: Tenant) {
        let mut inner = self.lock();
        inner.bump_next_id(tenant.id);
        inner.tenants.insert(tenant.id, tenant);
    }

    pub fn seed_user(&self, user: User) {
        let mut inner = self.lock();
        inner.bump_next_id(user.id);
        inner.users.insert(user.id, user);
    }

    pub fn seed_product(&self, product: Product) {
        let mut inner = self.lock();
        inner.bump_next_id(product.id);
        inner.products.insert(product.id, product);
    }

    pub fn seed_discount(&self, discount: Discount) {
        let mut inner = self.lock();
        inner.bump_next_id(discount.id);
        inner.discounts.insert(discount.id, discount);
    }

    pub fn seed_cart_item(&self, item: CartItem) {
        let mut inner = self.lock();
        inner.bump_next_id(item.id);
        inner.cart_items.insert(item.id, item);
    }

    pub fn seed_order(&self, order: Order, items: Vec<OrderItem>) {
        let mut inner = self.lock();
        inner.bump_next_id(order.id);
        inner.order_items.insert(order.id, items);
        inner.orders.insert(order.id, order);
    }

    // ---- 测试断言用的观察接口 ----

    pub fn product(&self, id: i64) -> Option<Product> {
        self.lock().products.get(&id).cloned()
    }

    pub fn order(&self, id: i64) -> Option<Order> {
        self.lock().orders.get(&id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn cart_count(&self, customer_id: i64) -> usize {
        self.lock()
            .cart_items
            .values()
            .filter(|item| item.customer_id == customer_id)
            .count()
    }

    pub fn discount(&self, id: i64) -> Option<Discount> {
        self.lock().discounts.get(&id).cloned()
    }
}

// ---- 仓储mock ----

pub struct MockTenantRepository {
    store: Arc<InMemoryStore>,
}

impl MockTenantRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantRepository for MockTenantRepository {
    async fn create(&self, tenant: &NewTenant) -> ShopResult<Tenant> {
        let mut inner = self.store.lock();
        if inner.tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(unique_violation("tenants_slug_key"));
        }
        let id = inner.alloc_id();
        let now = Utc::now();
        let created = Tenant {
            id,
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
            domain: None,
            description: tenant.description.clone(),
            logo_url: None,
            owner_id: tenant.owner_id,
            status: tenant.status,
            settings: None,
            created_at: now,
            updated_at: now,
        };
        inner.tenants.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Tenant>> {
        Ok(self.store.lock().tenants.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> ShopResult<Option<Tenant>> {
        Ok(self
            .store
            .lock()
            .tenants
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn list(&self, page: i64, page_size: i64) -> ShopResult<Vec<Tenant>> {
        let inner = self.store.lock();
        let mut tenants: Vec<_> = inner.tenants.values().cloned().collect();
        tenants.sort_by_key(|t| t.id);
        let skip = ((page.max(1) - 1) * page_size) as usize;
        Ok(tenants.into_iter().skip(skip).take(page_size as usize).collect())
    }

    async fn list_ids(&self) -> ShopResult<Vec<i64>> {
        let mut ids: Vec<_> = self.store.lock().tenants.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn set_owner(&self, tenant_id: i64, owner_id: i64) -> ShopResult<()> {
        let mut inner = self.store.lock();
        let tenant = inner
            .tenants
            .get_mut(&tenant_id)
            .ok_or(ShopError::TenantNotFound { id: tenant_id })?;
        tenant.owner_id = Some(owner_id);
        Ok(())
    }

    async fn delete(&self, id: i64) -> ShopResult<()> {
        let mut inner = self.store.lock();
        if inner.tenants.remove(&id).is_none() {
            return Err(ShopError::TenantNotFound { id });
        }
        let product_ids: Vec<i64> = inner
            .products
            .values()
            .filter(|p| p.tenant_id == id)
            .map(|p| p.id)
            .collect();
        inner.products.retain(|_, p| p.tenant_id != id);
        inner.discounts.retain(|_, d| d.tenant_id != id);
        inner
            .cart_items
            .retain(|_, c| !product_ids.contains(&c.product_id));
        inner.wishlist.retain(|w| !product_ids.contains(&w.product_id));
        let order_ids: Vec<i64> = inner
            .orders
            .values()
            .filter(|o| o.tenant_id == id)
            .map(|o| o.id)
            .collect();
        for order_id in order_ids {
            inner.orders.remove(&order_id);
            inner.order_items.remove(&order_id);
        }
        for user in inner.users.values_mut() {
            if user.tenant_id == Some(id) {
                user.tenant_id = None;
            }
        }
        Ok(())
    }
}

pub struct MockUserRepository {
    store: Arc<InMemoryStore>,
}

impl MockUserRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &NewUser) -> ShopResult<User> {
        let mut inner = self.store.lock();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(unique_violation("users_email_key"));
        }
        let id = inner.alloc_id();
        let now = Utc::now();
        let created = User {
            id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_active: true,
            tenant_id: user.tenant_id,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<User>> {
        Ok(self.store.lock().users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> ShopResult<Option<User>> {
        Ok(self
            .store
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

pub struct MockProductRepository {
    store: Arc<InMemoryStore>,
}

impl MockProductRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProductRepository for MockProductRepository {
    async fn create(&self, product: &NewProduct) -> ShopResult<Product> {
        let mut inner = self.store.lock();
        if inner.products.values().any(|p| p.sku == product.sku) {
            return Err(unique_violation("products_sku_key"));
        }
        let id = inner.alloc_id();
        let now = Utc::now();
        let created = Product {
            id,
            tenant_id: product.tenant_id,
            category_id: product.category_id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            sku: product.sku.clone(),
            description: product.description.clone(),
            base_price: product.base_price,
            discount_price: product.discount_price,
            stock_quantity: product.stock_quantity,
            low_stock_threshold: product.low_stock_threshold,
            track_inventory: product.track_inventory,
            status: product.status,
            is_featured: product.is_featured,
            views_count: 0,
            sales_count: 0,
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Product>> {
        Ok(self.store.lock().products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[i64]) -> ShopResult<Vec<Product>> {
        let inner = self.store.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn list(&self, filter: &ProductFilter) -> ShopResult<Vec<Product>> {
        let inner = self.store.lock();
        let mut products: Vec<_> = inner
            .products
            .values()
            .filter(|p| filter.tenant_id.is_none_or(|t| p.tenant_id == t))
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        products.sort_by_key(|p| std::cmp::Reverse(p.id));
        let page = filter.page.max(1);
        let page_size = filter.page_size.clamp(1, 100);
        let skip = ((page - 1) * page_size) as usize;
        Ok(products.into_iter().skip(skip).take(page_size as usize).collect())
    }

    async fn update(&self, id: i64, update: &ProductUpdate) -> ShopResult<Product> {
        let mut inner = self.store.lock();
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(ShopError::ProductNotFound { id })?;
        if let Some(name) = &update.name {
            product.name = name.clone();
        }
        if let Some(description) = &update.description {
            product.description = Some(description.clone());
        }
        if let Some(base_price) = update.base_price {
            product.base_price = base_price;
        }
        if let Some(discount_price) = update.discount_price {
            product.discount_price = discount_price;
        }
        if let Some(stock_quantity) = update.stock_quantity {
            product.stock_quantity = stock_quantity;
        }
        if let Some(threshold) = update.low_stock_threshold {
            product.low_stock_threshold = threshold;
        }
        if let Some(track_inventory) = update.track_inventory {
            product.track_inventory = track_inventory;
        }
        if let Some(status) = update.status {
            product.status = status;
        }
        if let Some(is_featured) = update.is_featured {
            product.is_featured = is_featured;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete(&self, id: i64) -> ShopResult<()> {
        let mut inner = self.store.lock();
        if inner.products.remove(&id).is_none() {
            return Err(ShopError::ProductNotFound { id });
        }
        inner.cart_items.retain(|_, c| c.product_id != id);
        inner.wishlist.retain(|w| w.product_id != id);
        Ok(())
    }

    async fn count(&self, tenant_id: Option<i64>) -> ShopResult<i64> {
        let inner = self.store.lock();
        Ok(inner
            .products
            .values()
            .filter(|p| tenant_id.is_none_or(|t| p.tenant_id == t))
            .count() as i64)
    }

    async fn tenant_stats(&self, tenant_id: i64) -> ShopResult<ProductStats> {
        let inner = self.store.lock();
        let products: Vec<_> = inner
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .collect();
        Ok(ProductStats {
            tenant_id,
            total_products: products.len() as i64,
            in_stock_products: products
                .iter()
                .filter(|p| !p.track_inventory || p.stock_quantity > 0)
                .count() as i64,
            total_sales: products.iter().map(|p| p.sales_count as i64).sum(),
        })
    }
}

pub struct MockCartRepository {
    store: Arc<InMemoryStore>,
}

impl MockCartRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CartRepository for MockCartRepository {
    async fn add_item(&self, item: &NewCartItem) -> ShopResult<CartItem> {
        let mut inner = self.store.lock();
        let existing = inner.cart_items.values_mut().find(|c| {
            c.customer_id == item.customer_id
                && c.product_id == item.product_id
                && c.variant_id == item.variant_id
        });
        if let Some(existing) = existing {
            existing.quantity += item.quantity;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let id = inner.alloc_id();
        let now = Utc::now();
        let created = CartItem {
            id,
            customer_id: item.customer_id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            selected_attributes: item.selected_attributes.clone(),
            added_at: now,
            updated_at: now,
        };
        inner.cart_items.insert(id, created.clone());
        Ok(created)
    }

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<CartItem>> {
        let inner = self.store.lock();
        let mut items: Vec<_> = inner
            .cart_items
            .values()
            .filter(|c| c.customer_id == customer_id)
            .cloned()
            .collect();
        items.sort_by_key(|c| c.id);
        Ok(items)
    }

    async fn update_quantity(
        &self,
        item_id: i64,
        customer_id: i64,
        quantity: i32,
    ) -> ShopResult<CartItem> {
        let mut inner = self.store.lock();
        let item = inner
            .cart_items
            .get_mut(&item_id)
            .filter(|c| c.customer_id == customer_id)
            .ok_or(ShopError::CartItemNotFound { id: item_id })?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn remove(&self, item_id: i64, customer_id: i64) -> ShopResult<()> {
        let mut inner = self.store.lock();
        let matches = inner
            .cart_items
            .get(&item_id)
            .is_some_and(|c| c.customer_id == customer_id);
        if !matches {
            return Err(ShopError::CartItemNotFound { id: item_id });
        }
        inner.cart_items.remove(&item_id);
        Ok(())
    }

    async fn clear_for_customer(&self, customer_id: i64) -> ShopResult<u64> {
        let mut inner = self.store.lock();
        let before = inner.cart_items.len();
        inner.cart_items.retain(|_, c| c.customer_id != customer_id);
        Ok((before - inner.cart_items.len()) as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> ShopResult<u64> {
        let mut inner = self.store.lock();
        let before = inner.cart_items.len();
        inner.cart_items.retain(|_, c| c.updated_at >= cutoff);
        Ok((before - inner.cart_items.len()) as u64)
    }
}

pub struct MockWishlistRepository {
    store: Arc<InMemoryStore>,
}

impl MockWishlistRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WishlistRepository for MockWishlistRepository {
    async fn add(&self, customer_id: i64, product_id: i64) -> ShopResult<WishlistItem> {
        let mut inner = self.store.lock();
        if let Some(existing) = inner
            .wishlist
            .iter()
            .find(|w| w.customer_id == customer_id && w.product_id == product_id)
        {
            return Ok(existing.clone());
        }
        let id = inner.alloc_id();
        let item = WishlistItem {
            id,
            customer_id,
            product_id,
            added_at: Utc::now(),
        };
        inner.wishlist.push(item.clone());
        Ok(item)
    }

    async fn list_for_customer(&self, customer_id: i64) -> ShopResult<Vec<WishlistItem>> {
        Ok(self
            .store
            .lock()
            .wishlist
            .iter()
            .filter(|w| w.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn remove(&self, customer_id: i64, product_id: i64) -> ShopResult<()> {
        self.store
            .lock()
            .wishlist
            .retain(|w| !(w.customer_id == customer_id && w.product_id == product_id));
        Ok(())
    }
}

pub struct MockDiscountRepository {
    store: Arc<InMemoryStore>,
}

impl MockDiscountRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DiscountRepository for MockDiscountRepository {
    async fn get_by_code(&self, tenant_id: i64, code: &str) -> ShopResult<Option<Discount>> {
        Ok(self
            .store
            .lock()
            .discounts
            .values()
            .find(|d| d.tenant_id == tenant_id && d.code == code)
            .cloned())
    }

    async fn increment_usage(&self, id: i64) -> ShopResult<()> {
        let mut inner = self.store.lock();
        if let Some(discount) = inner.discounts.get_mut(&id) {
            discount.usage_count += 1;
        }
        Ok(())
    }
}

pub struct MockOrderRepository {
    store: Arc<InMemoryStore>,
}

impl MockOrderRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepository {
    async fn create_order(&self, order: &NewOrder) -> ShopResult<Order> {
        // 整个创建流程持锁，模拟数据库事务的原子性
        let mut inner = self.store.lock();

        if inner
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(unique_violation("orders_order_number_key"));
        }

        // 先全量校验（等价于条件更新零行生效时回滚）
        for item in &order.items {
            let product = inner
                .products
                .get(&item.product_id)
                .ok_or(ShopError::ProductNotFound {
                    id: item.product_id,
                })?;
            if product.track_inventory && product.stock_quantity < item.quantity {
                return Err(ShopError::InsufficientStock {
                    product_id: item.product_id,
                });
            }
        }

        for item in &order.items {
            let product = inner.products.get_mut(&item.product_id).unwrap();
            if product.track_inventory {
                product.stock_quantity -= item.quantity;
            }
            product.sales_count += item.quantity;
        }

        let id = inner.alloc_id();
        let now = Utc::now();
        let created = Order {
            id,
            tenant_id: order.tenant_id,
            customer_id: order.customer_id,
            order_number: order.order_number.clone(),
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            shipping_cost: order.shipping_cost,
            tax_amount: order.tax_amount,
            total: order.total,
            discount_code: order.discount_code.clone(),
            shipping_address: order.shipping_address.clone(),
            billing_address: order.billing_address.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: order.payment_method.clone(),
            tracking_number: None,
            notes: order.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderItem> = order
            .items
            .iter()
            .map(|item| {
                let item_id = inner.alloc_id();
                OrderItem {
                    id: item_id,
                    order_id: id,
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    product_name: item.product_name.clone(),
                    product_attributes: item.product_attributes.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    created_at: now,
                }
            })
            .collect();

        inner
            .cart_items
            .retain(|_, c| c.customer_id != order.customer_id);
        inner.order_items.insert(id, items);
        inner.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Order>> {
        Ok(self.store.lock().orders.get(&id).cloned())
    }

    async fn get_items(&self, order_id: i64) -> ShopResult<Vec<OrderItem>> {
        Ok(self
            .store
            .lock()
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let inner = self.store.lock();
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.id));
        let skip = ((page.max(1) - 1) * page_size) as usize;
        Ok(orders.into_iter().skip(skip).take(page_size as usize).collect())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let inner = self.store.lock();
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.id));
        let skip = ((page.max(1) - 1) * page_size) as usize;
        Ok(orders.into_iter().skip(skip).take(page_size as usize).collect())
    }

    async fn cancel_order(&self, order_id: i64) -> ShopResult<Order> {
        let mut inner = self.store.lock();
        let order = inner
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(ShopError::OrderNotFound { id: order_id })?;
        if !order.status.is_cancellable() {
            return Err(ShopError::Conflict(format!(
                "订单状态为 {}，仅 pending 订单可取消",
                order.status.as_str()
            )));
        }
        let items = inner.order_items.get(&order_id).cloned().unwrap_or_default();
        for item in &items {
            if let Some(product) = inner.products.get_mut(&item.product_id) {
                if product.track_inventory {
                    product.stock_quantity += item.quantity;
                }
                product.sales_count -= item.quantity;
            }
        }
        let order = inner.orders.get_mut(&order_id).unwrap();
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> ShopResult<Order> {
        let mut inner = self.store.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(ShopError::OrderNotFound { id: order_id })?;
        order.status = status;
        if let Some(payment_status) = payment_status {
            order.payment_status = payment_status;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn mark_paid_if_unpaid(&self, order_id: i64) -> ShopResult<Option<Order>> {
        let mut inner = self.store.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(ShopError::OrderNotFound { id: order_id })?;
        if order.payment_status == PaymentStatus::Paid {
            return Ok(None);
        }
        order.status = OrderStatus::Confirmed;
        order.payment_status = PaymentStatus::Paid;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn mark_payment_failed(&self, order_id: i64) -> ShopResult<Order> {
        let mut inner = self.store.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(ShopError::OrderNotFound { id: order_id })?;
        if order.payment_status != PaymentStatus::Paid {
            order.payment_status = PaymentStatus::Failed;
            order.updated_at = Utc::now();
        }
        Ok(order.clone())
    }

    async fn find_unpaid_before(&self, cutoff: DateTime<Utc>) -> ShopResult<Vec<Order>> {
        let inner = self.store.lock();
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Pending
                    && o.payment_status == PaymentStatus::Pending
                    && o.created_at < cutoff
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ShopResult<SalesSummary> {
        let inner = self.store.lock();
        let matching: Vec<_> = inner
            .orders
            .values()
            .filter(|o| {
                o.status != OrderStatus::Cancelled && o.created_at >= from && o.created_at < to
            })
            .collect();
        Ok(SalesSummary {
            order_count: matching.len() as i64,
            total_revenue: matching.iter().map(|o| o.total).sum(),
        })
    }
}

// ---- 队列与发送mock ----

/// 永远失败的消息队列，模拟Broker不可达
pub struct FailingMessageQueue;

#[async_trait]
impl MessageQueue for FailingMessageQueue {
    async fn publish_message(&self, _queue: &str, _message: &TaskMessage) -> ShopResult<()> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn consume_messages(&self, _queue: &str) -> ShopResult<Vec<TaskMessage>> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn ack_message(&self, _message_id: &str) -> ShopResult<()> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn nack_message(&self, _message_id: &str, _requeue: bool) -> ShopResult<()> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn create_queue(&self, _queue: &str, _durable: bool) -> ShopResult<()> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn purge_queue(&self, _queue: &str) -> ShopResult<()> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }

    async fn get_queue_size(&self, _queue: &str) -> ShopResult<u32> {
        Err(ShopError::MessageQueue("Broker不可达".into()))
    }
}

/// 记录发送内容的邮件mock
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingEmailSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ShopResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// 记录发送内容的短信mock
#[derive(Default)]
pub struct RecordingSmsSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSmsSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSmsSender {
    async fn send(&self, phone: &str, message: &str) -> ShopResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

/// 记录发送内容的聊天通知mock
#[derive(Default)]
pub struct RecordingChatNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChatNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatNotifier for RecordingChatNotifier {
    async fn send(&self, chat_id: &str, message: &str) -> ShopResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message.to_string()));
        Ok(())
    }
}
