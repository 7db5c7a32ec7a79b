//! 测试数据构造器

use chrono::{Duration, Utc};

use shopd_core::models::{
    Address, Discount, DiscountKind, Product, ProductStatus, Tenant, TenantStatus, User, UserRole,
};

/// 测试用收货地址
pub fn test_address() -> Address {
    Address {
        full_name: "测试客户".to_string(),
        phone: Some("+86-13800000000".to_string()),
        line1: "人民路1号".to_string(),
        line2: None,
        city: "上海".to_string(),
        region: None,
        postal_code: Some("200000".to_string()),
        country: "CN".to_string(),
    }
}

pub struct TenantBuilder {
    tenant: Tenant,
}

impl TenantBuilder {
    pub fn new(id: i64) -> Self {
        let now = Utc::now();
        Self {
            tenant: Tenant {
                id,
                name: "测试店铺".to_string(),
                slug: format!("shop-{id}"),
                domain: None,
                description: None,
                logo_url: None,
                owner_id: None,
                status: TenantStatus::Active,
                settings: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn owner(mut self, owner_id: i64) -> Self {
        self.tenant.owner_id = Some(owner_id);
        self
    }

    pub fn slug(mut self, slug: &str) -> Self {
        self.tenant.slug = slug.to_string();
        self
    }

    pub fn build(self) -> Tenant {
        self.tenant
    }
}

pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new(id: i64) -> Self {
        let now = Utc::now();
        Self {
            user: User {
                id,
                email: format!("user{id}@example.com"),
                username: None,
                full_name: Some(format!("用户{id}")),
                phone: None,
                role: UserRole::Customer,
                is_active: true,
                tenant_id: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn role(mut self, role: UserRole) -> Self {
        self.user.role = role;
        self
    }

    pub fn tenant(mut self, tenant_id: i64) -> Self {
        self.user.tenant_id = Some(tenant_id);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.user.email = email.to_string();
        self
    }

    pub fn phone(mut self, phone: &str) -> Self {
        self.user.phone = Some(phone.to_string());
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}

pub struct ProductBuilder {
    product: Product,
}

impl ProductBuilder {
    pub fn new(id: i64, tenant_id: i64) -> Self {
        let now = Utc::now();
        Self {
            product: Product {
                id,
                tenant_id,
                category_id: None,
                name: format!("商品{id}"),
                slug: format!("product-{id}"),
                sku: format!("SKU-{id:04}"),
                description: None,
                base_price: 100.0,
                discount_price: None,
                stock_quantity: 10,
                low_stock_threshold: 5,
                track_inventory: true,
                status: ProductStatus::Active,
                is_featured: false,
                views_count: 0,
                sales_count: 0,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn price(mut self, base_price: f64) -> Self {
        self.product.base_price = base_price;
        self
    }

    pub fn discount_price(mut self, discount_price: f64) -> Self {
        self.product.discount_price = Some(discount_price);
        self
    }

    pub fn stock(mut self, stock_quantity: i32) -> Self {
        self.product.stock_quantity = stock_quantity;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.product.track_inventory = false;
        self
    }

    pub fn sales(mut self, sales_count: i32) -> Self {
        self.product.sales_count = sales_count;
        self
    }

    pub fn build(self) -> Product {
        self.product
    }
}

pub struct DiscountBuilder {
    discount: Discount,
}

impl DiscountBuilder {
    pub fn new(id: i64, tenant_id: i64, code: &str) -> Self {
        let now = Utc::now();
        Self {
            discount: Discount {
                id,
                tenant_id,
                code: code.to_string(),
                name: "测试优惠".to_string(),
                kind: DiscountKind::Percentage,
                value: 10.0,
                min_purchase_amount: 0.0,
                max_discount_amount: None,
                usage_limit: None,
                usage_count: 0,
                valid_from: now - Duration::days(1),
                valid_to: now + Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn kind(mut self, kind: DiscountKind) -> Self {
        self.discount.kind = kind;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.discount.value = value;
        self
    }

    pub fn min_purchase(mut self, amount: f64) -> Self {
        self.discount.min_purchase_amount = amount;
        self
    }

    pub fn max_discount(mut self, amount: f64) -> Self {
        self.discount.max_discount_amount = Some(amount);
        self
    }

    pub fn usage(mut self, limit: i32, used: i32) -> Self {
        self.discount.usage_limit = Some(limit);
        self.discount.usage_count = used;
        self
    }

    pub fn expired(mut self) -> Self {
        self.discount.valid_to = Utc::now() - Duration::hours(1);
        self
    }

    pub fn build(self) -> Discount {
        self.discount
    }
}
