//! Persistence seams for checkout and payment reconciliation.
//!
//! [`CheckoutStore::begin`] opens an all-or-nothing unit of work: dropping the
//! returned transaction without calling [`CheckoutTx::commit`] discards every
//! change made through it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::aggregates::{CartLine, NewOrder, Order, OrderLine, OrderStatus, PaymentStatus, Product};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CheckoutTx: Send {
    /// Cart lines of the user, ordered by product id.
    async fn cart_lines(&mut self, user_id: i64) -> Result<Vec<CartLine>>;

    /// Reads the live product row and holds it until the transaction ends.
    async fn lock_product(&mut self, product_id: i64) -> Result<Option<Product>>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<(Order, Vec<OrderLine>)>;

    /// Decrements stock only if it covers `quantity`. Returns `false` otherwise.
    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool>;

    async fn clear_cart(&mut self, user_id: i64) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>>;

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<Order>>;

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>>;

    /// Orders placed by the user, newest first.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;

    /// Persists the payment-link fields of `order` (url, reference, expiry,
    /// message, audit) unless its payment settled in the meantime, in which
    /// case nothing is written and `None` is returned.
    async fn save_payment_link(&self, order: &Order) -> Result<Option<Order>>;

    /// Compare-and-swap on the payment status: writes the payment fields of
    /// `order` only if the stored status still equals `expected`.
    async fn save_payment_outcome(&self, order: &Order, expected: PaymentStatus) -> Result<Option<Order>>;

    /// Compare-and-swap on the fulfilment status.
    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> Result<Option<Order>>;
}

pub trait Store: CheckoutStore + OrderRepository {}

impl<T: CheckoutStore + OrderRepository> Store for T {}
