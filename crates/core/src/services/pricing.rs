//! 定价计算
//!
//! 纯计算模块：输入商品快照、请求行项目和可选优惠码，产出行项目
//! 单价/小计与订单总额。商品的读取由调用方（订单服务）完成，这里
//! 不接触存储，库存的权威检查在订单创建事务内的条件扣减。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ShopError, ShopResult};
use crate::models::{Discount, DiscountKind, NewOrderItem, Product};

/// 统一税率（策略常量，无地区逻辑）
pub const TAX_RATE: f64 = 0.10;

/// 固定运费（占位，未实现按地址计算）
pub const FLAT_SHIPPING_COST: f64 = 0.0;

/// 请求的订单行项目
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestedItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
}

/// 定价结果
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub items: Vec<NewOrderItem>,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub discount_id: Option<i64>,
    pub shipping_cost: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// 计算订单定价
///
/// 失败情形：
/// - 商品不存在 -> `ProductNotFound`
/// - 商品不属于该租户或数量非法 -> `Validation`
/// - 追踪库存的商品库存不足 -> `InsufficientStock`（预检；事务内还有权威检查）
/// - 优惠码校验失败 -> `Validation`
pub fn price_order(
    products: &HashMap<i64, Product>,
    requested: &[RequestedItem],
    tenant_id: i64,
    discount: Option<&Discount>,
    now: DateTime<Utc>,
) -> ShopResult<PricedOrder> {
    if requested.is_empty() {
        return Err(ShopError::Validation("订单不能没有行项目".into()));
    }

    let mut items = Vec::with_capacity(requested.len());
    let mut subtotal = 0.0;

    for req in requested {
        if req.quantity <= 0 {
            return Err(ShopError::Validation(format!(
                "商品 {} 的数量必须大于0",
                req.product_id
            )));
        }
        let product = products
            .get(&req.product_id)
            .ok_or(ShopError::ProductNotFound { id: req.product_id })?;
        if product.tenant_id != tenant_id {
            return Err(ShopError::Validation(format!(
                "商品 {} 不属于当前店铺",
                req.product_id
            )));
        }
        if !product.has_stock_for(req.quantity) {
            return Err(ShopError::InsufficientStock {
                product_id: product.id,
            });
        }

        let unit_price = product.unit_price();
        let total_price = unit_price * req.quantity as f64;
        subtotal += total_price;

        items.push(NewOrderItem {
            product_id: product.id,
            variant_id: req.variant_id,
            product_name: product.name.clone(),
            product_attributes: req.selected_attributes.clone(),
            quantity: req.quantity,
            unit_price,
            total_price,
        });
    }

    let shipping_cost = FLAT_SHIPPING_COST;
    let (discount_amount, discount_id) = match discount {
        Some(d) => (apply_discount(d, subtotal, shipping_cost, now)?, Some(d.id)),
        None => (0.0, None),
    };
    let tax_amount = subtotal * TAX_RATE;
    let total = subtotal - discount_amount + shipping_cost + tax_amount;

    Ok(PricedOrder {
        items,
        subtotal,
        discount_amount,
        discount_id,
        shipping_cost,
        tax_amount,
        total,
    })
}

/// 校验优惠码并计算优惠金额
pub fn apply_discount(
    discount: &Discount,
    subtotal: f64,
    shipping_cost: f64,
    now: DateTime<Utc>,
) -> ShopResult<f64> {
    if !discount.is_active {
        return Err(ShopError::Validation(format!(
            "优惠码 {} 已停用",
            discount.code
        )));
    }
    if !discount.is_within_window(now) {
        return Err(ShopError::Validation(format!(
            "优惠码 {} 不在有效期内",
            discount.code
        )));
    }
    if !discount.has_usage_left() {
        return Err(ShopError::Validation(format!(
            "优惠码 {} 使用次数已用完",
            discount.code
        )));
    }
    if subtotal < discount.min_purchase_amount {
        return Err(ShopError::Validation(format!(
            "订单金额未达到优惠码 {} 的最低消费 {:.2}",
            discount.code, discount.min_purchase_amount
        )));
    }

    let amount = match discount.kind {
        DiscountKind::Percentage => {
            let raw = subtotal * discount.value / 100.0;
            match discount.max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountKind::Fixed => discount.value.min(subtotal),
        DiscountKind::FreeShipping => shipping_cost,
    };
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStatus;
    use chrono::Duration;

    fn product(id: i64, base: f64, discount: Option<f64>, stock: i32, tracked: bool) -> Product {
        Product {
            id,
            tenant_id: 1,
            category_id: None,
            name: format!("商品{id}"),
            slug: format!("product-{id}"),
            sku: format!("SKU-{id}"),
            description: None,
            base_price: base,
            discount_price: discount,
            stock_quantity: stock,
            low_stock_threshold: 5,
            track_inventory: tracked,
            status: ProductStatus::Active,
            is_featured: false,
            views_count: 0,
            sales_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<i64, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    fn item(product_id: i64, quantity: i32) -> RequestedItem {
        RequestedItem {
            product_id,
            variant_id: None,
            quantity,
            selected_attributes: None,
        }
    }

    fn percentage_discount(value: f64, cap: Option<f64>, min_purchase: f64) -> Discount {
        let now = Utc::now();
        Discount {
            id: 9,
            tenant_id: 1,
            code: "SAVE".to_string(),
            name: "促销".to_string(),
            kind: DiscountKind::Percentage,
            value,
            min_purchase_amount: min_purchase,
            max_discount_amount: cap,
            usage_limit: None,
            usage_count: 0,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_invariant() {
        let products = catalog(vec![
            product(1, 100.0, Some(80.0), 10, true),
            product(2, 25.0, None, 10, true),
        ]);
        let priced =
            price_order(&products, &[item(1, 2), item(2, 3)], 1, None, Utc::now()).unwrap();

        // 折扣价生效: 80*2 + 25*3 = 235
        assert!((priced.subtotal - 235.0).abs() < 1e-9);
        assert!((priced.tax_amount - 23.5).abs() < 1e-9);
        assert_eq!(priced.shipping_cost, 0.0);
        let expected =
            priced.subtotal - priced.discount_amount + priced.shipping_cost + priced.tax_amount;
        assert!((priced.total - expected).abs() < 1e-9);
        for it in &priced.items {
            assert!((it.total_price - it.unit_price * it.quantity as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_product() {
        let products = catalog(vec![product(1, 10.0, None, 10, true)]);
        let err = price_order(&products, &[item(99, 1)], 1, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ShopError::ProductNotFound { id: 99 }));
    }

    #[test]
    fn test_insufficient_stock_precheck() {
        let products = catalog(vec![product(1, 10.0, None, 5, true)]);
        let err = price_order(&products, &[item(1, 6)], 1, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { product_id: 1 }));
    }

    #[test]
    fn test_untracked_product_ignores_stock() {
        let products = catalog(vec![product(1, 10.0, None, 0, false)]);
        assert!(price_order(&products, &[item(1, 100)], 1, None, Utc::now()).is_ok());
    }

    #[test]
    fn test_wrong_tenant_rejected() {
        let mut p = product(1, 10.0, None, 10, true);
        p.tenant_id = 2;
        let products = catalog(vec![p]);
        let err = price_order(&products, &[item(1, 1)], 1, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let products = catalog(vec![product(1, 10.0, None, 10, true)]);
        let err = price_order(&products, &[item(1, 0)], 1, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }

    #[test]
    fn test_percentage_discount_with_cap() {
        let d = percentage_discount(10.0, Some(15.0), 0.0);
        assert!((apply_discount(&d, 100.0, 0.0, Utc::now()).unwrap() - 10.0).abs() < 1e-9);
        // 超过上限时封顶
        assert!((apply_discount(&d, 500.0, 0.0, Utc::now()).unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_discount_capped_by_subtotal() {
        let mut d = percentage_discount(50.0, None, 0.0);
        d.kind = DiscountKind::Fixed;
        assert!((apply_discount(&d, 30.0, 0.0, Utc::now()).unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_expired_discount_rejected() {
        let mut d = percentage_discount(10.0, None, 0.0);
        d.valid_to = Utc::now() - Duration::hours(1);
        assert!(apply_discount(&d, 100.0, 0.0, Utc::now()).is_err());
    }

    #[test]
    fn test_min_purchase_enforced() {
        let d = percentage_discount(10.0, None, 50.0);
        assert!(apply_discount(&d, 49.0, 0.0, Utc::now()).is_err());
        assert!(apply_discount(&d, 50.0, 0.0, Utc::now()).is_ok());
    }

    #[test]
    fn test_exhausted_discount_rejected() {
        let mut d = percentage_discount(10.0, None, 0.0);
        d.usage_limit = Some(3);
        d.usage_count = 3;
        assert!(apply_discount(&d, 100.0, 0.0, Utc::now()).is_err());
    }
}
