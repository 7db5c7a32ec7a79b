//! 订单仓储的PostgreSQL实现
//!
//! 订单创建/取消是复合写入事务。库存扣减用条件更新实现，
//! `stock_quantity >= 请求数量` 不满足时零行生效、整个事务回滚，
//! 并发下单同一商品时由行级更新串行化，不会超卖。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use shopd_core::models::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentStatus, SalesSummary,
};
use shopd_core::traits::OrderRepository;
use shopd_core::{ShopError, ShopResult};

const ORDER_COLUMNS: &str = "id, tenant_id, customer_id, order_number, subtotal, discount_amount, \
     shipping_cost, tax_amount, total, discount_code, shipping_address, billing_address, \
     status, payment_status, payment_method, tracking_number, notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, product_name, \
     product_attributes, quantity, unit_price, total_price, created_at";

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &sqlx::postgres::PgRow) -> ShopResult<Order> {
        let shipping: serde_json::Value = row.try_get("shipping_address")?;
        let billing: serde_json::Value = row.try_get("billing_address")?;
        Ok(Order {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            customer_id: row.try_get("customer_id")?,
            order_number: row.try_get("order_number")?,
            subtotal: row.try_get("subtotal")?,
            discount_amount: row.try_get("discount_amount")?,
            shipping_cost: row.try_get("shipping_cost")?,
            tax_amount: row.try_get("tax_amount")?,
            total: row.try_get("total")?,
            discount_code: row.try_get("discount_code")?,
            shipping_address: serde_json::from_value(shipping)
                .map_err(|e| ShopError::Serialization(format!("解析收货地址失败: {e}")))?,
            billing_address: serde_json::from_value(billing)
                .map_err(|e| ShopError::Serialization(format!("解析账单地址失败: {e}")))?,
            status: row.try_get("status")?,
            payment_status: row.try_get("payment_status")?,
            payment_method: row.try_get("payment_method")?,
            tracking_number: row.try_get("tracking_number")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &sqlx::postgres::PgRow) -> ShopResult<OrderItem> {
        Ok(OrderItem {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            variant_id: row.try_get("variant_id")?,
            product_name: row.try_get("product_name")?,
            product_attributes: row.try_get("product_attributes")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            total_price: row.try_get("total_price")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn create_order(&self, order: &NewOrder) -> ShopResult<Order> {
        let shipping = serde_json::to_value(&order.shipping_address)
            .map_err(|e| ShopError::Serialization(format!("序列化收货地址失败: {e}")))?;
        let billing = serde_json::to_value(&order.billing_address)
            .map_err(|e| ShopError::Serialization(format!("序列化账单地址失败: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (tenant_id, customer_id, order_number, subtotal, discount_amount,
                shipping_cost, tax_amount, total, discount_code, shipping_address, billing_address,
                status, payment_status, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', 'pending', $12, $13)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.tenant_id)
        .bind(order.customer_id)
        .bind(&order.order_number)
        .bind(order.subtotal)
        .bind(order.discount_amount)
        .bind(order.shipping_cost)
        .bind(order.tax_amount)
        .bind(order.total)
        .bind(&order.discount_code)
        .bind(&shipping)
        .bind(&billing)
        .bind(&order.payment_method)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;
        let created = Self::row_to_order(&row)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, variant_id, product_name,
                    product_attributes, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.product_name)
            .bind(&item.product_attributes)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await?;

            // 条件扣减：库存不足时零行生效，事务随Drop回滚
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = CASE WHEN track_inventory
                        THEN stock_quantity - $1 ELSE stock_quantity END,
                    sales_count = sales_count + $1,
                    updated_at = now()
                WHERE id = $2 AND (NOT track_inventory OR stock_quantity >= $1)
                "#,
            )
            .bind(item.quantity)
            .bind(item.product_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(ShopError::InsufficientStock {
                    product_id: item.product_id,
                });
            }
        }

        // 下单成功后清空该客户的购物车，同一事务
        sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(order.customer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(order_id = created.id, "订单事务已提交");
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ShopResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn get_items(&self, order_id: i64) -> ShopResult<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = "
        ));
        qb.push_bind(customer_id);
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind((page - 1) * page_size);
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn list_by_tenant(
        &self,
        tenant_id: i64,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> ShopResult<Vec<Order>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind((page - 1) * page_size);
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: i64) -> ShopResult<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ShopError::OrderNotFound { id: order_id })?;
        let order = Self::row_to_order(&row)?;

        if !order.status.is_cancellable() {
            return Err(ShopError::Conflict(format!(
                "订单状态为 {}，仅 pending 订单可取消",
                order.status.as_str()
            )));
        }

        let items = sqlx::query("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;
        for item in &items {
            let product_id: i64 = item.try_get("product_id")?;
            let quantity: i32 = item.try_get("quantity")?;
            sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = CASE WHEN track_inventory
                        THEN stock_quantity + $1 ELSE stock_quantity END,
                    sales_count = sales_count - $1,
                    updated_at = now()
                WHERE id = $2
                "#,
            )
            .bind(quantity)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(&format!(
            "UPDATE orders SET status = 'cancelled', updated_at = now() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;
        let cancelled = Self::row_to_order(&row)?;

        tx.commit().await?;
        Ok(cancelled)
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> ShopResult<Order> {
        let row = match payment_status {
            Some(payment) => {
                sqlx::query(&format!(
                    "UPDATE orders SET status = $1, payment_status = $2, updated_at = now() \
                     WHERE id = $3 RETURNING {ORDER_COLUMNS}"
                ))
                .bind(status.as_str())
                .bind(payment.as_str())
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "UPDATE orders SET status = $1, updated_at = now() \
                     WHERE id = $2 RETURNING {ORDER_COLUMNS}"
                ))
                .bind(status.as_str())
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        let row = row.ok_or(ShopError::OrderNotFound { id: order_id })?;
        Self::row_to_order(&row)
    }

    async fn mark_paid_if_unpaid(&self, order_id: i64) -> ShopResult<Option<Order>> {
        // 守卫条件保证幂等：已支付订单不会再次生效
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = 'confirmed', payment_status = 'paid', updated_at = now() \
             WHERE id = $1 AND payment_status <> 'paid' RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_order(&row)?)),
            None => {
                let exists = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
                    .bind(order_id)
                    .fetch_optional(&self.pool)
                    .await?;
                if exists.is_none() {
                    return Err(ShopError::OrderNotFound { id: order_id });
                }
                Ok(None)
            }
        }
    }

    async fn mark_payment_failed(&self, order_id: i64) -> ShopResult<Order> {
        // 已支付的订单不被迟到的失败回调降级
        let row = sqlx::query(&format!(
            "UPDATE orders SET payment_status = 'failed', updated_at = now() \
             WHERE id = $1 AND payment_status <> 'paid' RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => self
                .get_by_id(order_id)
                .await?
                .ok_or(ShopError::OrderNotFound { id: order_id }),
        }
    }

    async fn find_unpaid_before(&self, cutoff: DateTime<Utc>) -> ShopResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status = 'pending' AND payment_status = 'pending' AND created_at < $1 \
             ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ShopResult<SalesSummary> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS order_count, COALESCE(SUM(total), 0) AS total_revenue \
             FROM orders WHERE created_at >= $1 AND created_at < $2 AND status <> 'cancelled'",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(SalesSummary {
            order_count: row.try_get("order_count")?,
            total_revenue: row.try_get("total_revenue")?,
        })
    }
}
