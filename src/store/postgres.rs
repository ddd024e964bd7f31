//! PostgreSQL store backed by `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::aggregates::{CartLine, NewOrder, Order, OrderLine, OrderStatus, PaymentStatus, Product};
use crate::store::{CheckoutStore, CheckoutTx, OrderRepository};
use crate::{EcommerceError, Result};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: i64,
    payment_method: String,
    payment_status: String,
    order_status: String,
    payment_url: Option<String>,
    external_ref: Option<String>,
    payment_expires_at: Option<DateTime<Utc>>,
    transaction_no: Option<String>,
    payment_message: Option<String>,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

fn parse_column<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| EcommerceError::Storage(format!("unexpected {column} value {raw:?}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = EcommerceError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            total_amount: row.total_amount,
            payment_method: parse_column("payment_method", &row.payment_method)?,
            payment_status: parse_column("payment_status", &row.payment_status)?,
            order_status: parse_column("order_status", &row.order_status)?,
            payment_url: row.payment_url,
            external_ref: row.external_ref,
            payment_expires_at: row.payment_expires_at,
            transaction_no: row.transaction_no,
            payment_message: row.payment_message,
            phone: row.phone,
            address: row.address,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
            events: vec![],
        })
    }
}

fn into_order(row: Option<OrderRow>) -> Result<Option<Order>> {
    row.map(Order::try_from).transpose()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckoutTx {
    async fn cart_lines(&mut self, user_id: i64) -> Result<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>("SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY product_id")
            .bind(user_id).fetch_all(&mut *self.tx).await?;
        Ok(lines)
    }

    async fn lock_product(&mut self, product_id: i64) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT id, name, sell_price, quantity FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id).fetch_optional(&mut *self.tx).await?;
        Ok(product)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<(Order, Vec<OrderLine>)> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, total_amount, payment_method, payment_status, order_status, payment_message, phone, address, created_at, created_by) \
             VALUES ($1, $2, $3, 'PENDING', 'PENDING', $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(order.user_id).bind(order.total_amount).bind(order.payment_method.as_ref()).bind(&order.payment_message)
        .bind(&order.phone).bind(&order.address).bind(order.created_at).bind(&order.created_by)
        .fetch_one(&mut *self.tx).await?;

        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let line_id: i64 = sqlx::query_scalar(
                "INSERT INTO order_lines (order_id, product_id, product_name, unit_price, quantity, line_total) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(id).bind(line.product_id).bind(&line.product_name).bind(line.unit_price).bind(line.quantity).bind(line.line_total)
            .fetch_one(&mut *self.tx).await?;
            lines.push(line.clone().with_ids(line_id, id));
        }
        Ok((order.with_id(id), lines))
    }

    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET quantity = quantity - $2, updated_at = NOW() WHERE id = $1 AND quantity >= $2")
            .bind(product_id).bind(quantity).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_cart(&mut self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckoutTx { tx }))
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        into_order(row)
    }

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE external_ref = $1").bind(external_ref).fetch_optional(&self.pool).await?;
        into_order(row)
    }

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id")
            .bind(order_id).fetch_all(&self.pool).await?;
        Ok(lines)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn save_payment_link(&self, order: &Order) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET payment_url = $2, external_ref = $3, payment_expires_at = $4, payment_message = $5, updated_at = $6, updated_by = $7 \
             WHERE id = $1 AND payment_status IN ('PENDING', 'FAILED') RETURNING *",
        )
        .bind(order.id).bind(&order.payment_url).bind(&order.external_ref).bind(order.payment_expires_at)
        .bind(&order.payment_message).bind(order.updated_at).bind(&order.updated_by)
        .fetch_optional(&self.pool).await?;
        into_order(row)
    }

    async fn save_payment_outcome(&self, order: &Order, expected: PaymentStatus) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET payment_status = $2, payment_message = $3, transaction_no = $4, updated_at = $5, updated_by = $6 \
             WHERE id = $1 AND payment_status = $7 RETURNING *",
        )
        .bind(order.id).bind(order.payment_status.as_ref()).bind(&order.payment_message).bind(&order.transaction_no)
        .bind(order.updated_at).bind(&order.updated_by).bind(expected.as_ref())
        .fetch_optional(&self.pool).await?;
        into_order(row)
    }

    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET order_status = $2, updated_at = $3, updated_by = $4 WHERE id = $1 AND order_status = $5 RETURNING *",
        )
        .bind(order.id).bind(order.order_status.as_ref()).bind(order.updated_at).bind(&order.updated_by).bind(expected.as_ref())
        .fetch_optional(&self.pool).await?;
        into_order(row)
    }
}
