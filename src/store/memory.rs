//! In-memory store. Transactions are serialized by a single async mutex and
//! work on a private copy that replaces the shared state on commit.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::aggregates::{CartLine, NewOrder, Order, OrderLine, OrderStatus, PaymentStatus, Product};
use crate::domain::value_objects::Quantity;
use crate::store::{CheckoutStore, CheckoutTx, OrderRepository};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    products: BTreeMap<i64, Product>,
    carts: HashMap<i64, Vec<CartLine>>,
    orders: BTreeMap<i64, Order>,
    lines: Vec<OrderLine>,
    next_order_id: i64,
    next_line_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn stored(order: &Order) -> Order {
    let mut copy = order.clone();
    copy.events.clear();
    copy
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn put_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn product(&self, id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// Adds to the user's cart, merging quantities for the same product.
    pub async fn add_to_cart(&self, user_id: i64, product_id: i64, quantity: i32) {
        let mut state = self.state.lock().await;
        let cart = state.carts.entry(user_id).or_default();
        match cart.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.push(CartLine::new(product_id, quantity)),
        }
    }

    pub async fn cart(&self, user_id: i64) -> Vec<CartLine> {
        self.state.lock().await.carts.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

struct MemoryTx {
    shared: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl CheckoutTx for MemoryTx {
    async fn cart_lines(&mut self, user_id: i64) -> Result<Vec<CartLine>> {
        let mut lines = self.work.carts.get(&user_id).cloned().unwrap_or_default();
        lines.sort_by_key(|l| l.product_id);
        Ok(lines)
    }

    async fn lock_product(&mut self, product_id: i64) -> Result<Option<Product>> {
        Ok(self.work.products.get(&product_id).cloned())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<(Order, Vec<OrderLine>)> {
        self.work.next_order_id += 1;
        let placed = order.with_id(self.work.next_order_id);
        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            self.work.next_line_id += 1;
            lines.push(line.clone().with_ids(self.work.next_line_id, placed.id()));
        }
        self.work.orders.insert(placed.id(), stored(&placed));
        self.work.lines.extend(lines.iter().cloned());
        Ok((placed, lines))
    }

    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool> {
        let qty = Quantity::new(quantity).map_err(|e| EcommerceError::Validation(e.to_string()))?;
        let product = self.work.products.get_mut(&product_id).ok_or(EcommerceError::ProductNotFound(product_id))?;
        Ok(product.remove_inventory(qty).is_ok())
    }

    async fn clear_cart(&mut self, user_id: i64) -> Result<()> {
        self.work.carts.remove(&user_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut shared, work } = *self;
        *shared = work;
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>> {
        let shared = self.state.clone().lock_owned().await;
        let work = shared.clone();
        Ok(Box::new(MemoryTx { shared, work }))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().find(|o| o.external_ref() == Some(external_ref)).cloned())
    }

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
        let state = self.state.lock().await;
        Ok(state.lines.iter().filter(|l| l.order_id == order_id).cloned().collect())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().rev().filter(|o| o.user_id() == user_id).cloned().collect())
    }

    async fn save_payment_link(&self, order: &Order) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.orders.get_mut(&order.id()) else { return Ok(None) };
        if current.payment_status().is_settled() { return Ok(None); }
        current.payment_url = order.payment_url.clone();
        current.external_ref = order.external_ref.clone();
        current.payment_expires_at = order.payment_expires_at;
        current.payment_message = order.payment_message.clone();
        current.updated_at = order.updated_at;
        current.updated_by = order.updated_by.clone();
        Ok(Some(current.clone()))
    }

    async fn save_payment_outcome(&self, order: &Order, expected: PaymentStatus) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.orders.get_mut(&order.id()) else { return Ok(None) };
        if current.payment_status() != expected { return Ok(None); }
        current.payment_status = order.payment_status;
        current.payment_message = order.payment_message.clone();
        current.transaction_no = order.transaction_no.clone();
        current.updated_at = order.updated_at;
        current.updated_by = order.updated_by.clone();
        Ok(Some(current.clone()))
    }

    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.orders.get_mut(&order.id()) else { return Ok(None) };
        if current.order_status() != expected { return Ok(None); }
        current.order_status = order.order_status;
        current.updated_at = order.updated_at;
        current.updated_by = order.updated_by.clone();
        Ok(Some(current.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewOrderLine, PaymentMethod};
    use chrono::Utc;

    fn draft() -> NewOrder {
        let line = NewOrderLine { product_id: 1, product_name: "Mug".into(), unit_price: 100, quantity: 2, line_total: 200 };
        NewOrder::place(5, "u@example.com", PaymentMethod::Cod, "0912345678", "addr", vec![line], Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        store.put_product(Product::new(1, "Mug", 100, 3)).await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&draft()).await.unwrap();
            assert!(tx.decrement_stock(1, 2).await.unwrap());
        }
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.product(1).await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();
        store.put_product(Product::new(1, "Mug", 100, 3)).await;
        let mut tx = store.begin().await.unwrap();
        let (order, lines) = tx.insert_order(&draft()).await.unwrap();
        assert!(!tx.decrement_stock(1, 4).await.unwrap());
        assert!(tx.decrement_stock(1, 2).await.unwrap());
        tx.commit().await.unwrap();
        assert_eq!(store.product(1).await.unwrap().quantity, 1);
        assert_eq!(store.lines(order.id()).await.unwrap(), lines);
    }

    #[tokio::test]
    async fn test_order_status_swap_checks_expected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let (mut order, _) = tx.insert_order(&draft()).await.unwrap();
        tx.commit().await.unwrap();

        order.set_order_status(OrderStatus::Confirmed, "staff", Utc::now()).unwrap();
        assert!(store.save_order_status(&order, OrderStatus::Shipping).await.unwrap().is_none());
        let saved = store.save_order_status(&order, OrderStatus::Pending).await.unwrap().unwrap();
        assert_eq!(saved.order_status(), OrderStatus::Confirmed);
        assert!(store.save_order_status(&order, OrderStatus::Pending).await.unwrap().is_none());
        assert_eq!(store.list_by_user(5).await.unwrap().len(), 1);
        assert!(store.list_by_user(6).await.unwrap().is_empty());
    }
}
