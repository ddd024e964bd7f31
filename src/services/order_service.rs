//! Checkout: cart to order, inventory decrement and payment-link issuance.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{CurrentUser, NewOrder, Order, OrderLine, OrderStatus, PaymentMethod};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::CurrencyConversion;
use crate::messaging::EventPublisher;
use crate::payment::{LinkRequest, PaymentLinkBuilder};
use crate::services::require_staff;
use crate::store::Store;
use crate::{EcommerceError, Result};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[0-9]{9}$").expect("phone pattern is valid"));

fn validate_phone(phone: &str) -> std::result::Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_phone");
        err.message = Some("Phone must be 10 digits starting with 0".into());
        Err(err)
    }
}

fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(custom = "validate_not_blank")]
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatus {
    pub order_status: OrderStatus,
}

pub struct OrderService {
    store: Arc<dyn Store>,
    links: PaymentLinkBuilder,
    conversion: Arc<dyn CurrencyConversion>,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, links: PaymentLinkBuilder, conversion: Arc<dyn CurrencyConversion>, events: EventPublisher) -> Self {
        Self { store, links, conversion, events }
    }

    /// Turns the caller's cart into an order in one transaction. For TRANSFER
    /// orders a payment link is issued after commit; if that fails the order
    /// stays PENDING without a link and [`OrderService::payment_url`] retries.
    #[instrument(skip(self, user, req), fields(user_id = user.id))]
    pub async fn place_order(&self, user: &CurrentUser, req: CheckoutRequest, client_ip: &str) -> Result<PlacedOrder> {
        req.validate().map_err(|e| EcommerceError::Validation(e.to_string()))?;

        let mut tx = self.store.begin().await?;
        let cart = tx.cart_lines(user.id).await?;
        if cart.is_empty() {
            return Err(EcommerceError::EmptyCart);
        }

        let mut priced = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = tx.lock_product(line.product_id).await?.ok_or(EcommerceError::ProductNotFound(line.product_id))?;
            priced.push(line.price(&product)?);
        }

        let now = Utc::now();
        let mut draft = NewOrder::place(user.id, user.email.as_str(), req.payment_method, req.phone.trim(), req.address.trim(), priced, now)?;
        if draft.payment_method == PaymentMethod::Cod {
            let due = self.conversion.convert(draft.total_amount).unwrap_or(draft.total_amount);
            draft = draft.with_message(format!("Please pay {due} on delivery"));
        }

        let (mut order, lines) = tx.insert_order(&draft).await?;
        for line in &lines {
            if !tx.decrement_stock(line.product_id, line.quantity).await? {
                return Err(EcommerceError::InsufficientStock { product: line.product_name.clone() });
            }
        }
        tx.clear_cart(user.id).await?;
        tx.commit().await?;
        info!(order_id = order.id(), total = order.total_amount(), method = %order.payment_method(), "order placed");

        let mut events = order.take_events();
        let mut payment_url = None;
        if order.payment_method() == PaymentMethod::Transfer {
            match self.issue_link(&order, &user.email, client_ip).await {
                Ok((linked, link_events)) => {
                    events.extend(link_events);
                    payment_url = linked.payment_url().map(str::to_string);
                    order = linked;
                }
                Err(e) => warn!(order_id = order.id(), error = %e, "payment link not issued, order left pending"),
            }
        }
        self.events.publish_all(events).await;

        Ok(PlacedOrder { order, lines, payment_url })
    }

    /// Returns the stored link while it is still live, otherwise issues and
    /// stores a fresh one under a new reference.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn payment_url(&self, user: &CurrentUser, order_id: i64, client_ip: &str) -> Result<String> {
        let order = self.visible_order(user, order_id).await?;
        if order.payment_method() != PaymentMethod::Transfer {
            return Err(EcommerceError::InvalidPaymentMethod);
        }
        if order.payment_status().is_settled() {
            return Err(EcommerceError::AlreadyPaid(order_id));
        }
        if let Some(url) = order.live_payment_url(Utc::now()) {
            return Ok(url.to_string());
        }

        let (linked, events) = self.issue_link(&order, &user.email, client_ip).await?;
        let url = linked.payment_url().map(str::to_string)
            .ok_or_else(|| EcommerceError::Gateway(format!("order {order_id} has no payment link after issuing one")))?;
        self.events.publish_all(events).await;
        Ok(url)
    }

    pub async fn order_with_lines(&self, user: &CurrentUser, order_id: i64) -> Result<(Order, Vec<OrderLine>)> {
        let order = self.visible_order(user, order_id).await?;
        let lines = self.store.lines(order_id).await?;
        Ok((order, lines))
    }

    /// The caller's own orders with their lines, newest first.
    pub async fn my_orders(&self, user: &CurrentUser) -> Result<Vec<OrderDetails>> {
        let orders = self.store.list_by_user(user.id).await?;
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = self.store.lines(order.id()).await?;
            details.push(OrderDetails { order, lines });
        }
        Ok(details)
    }

    /// Staff-only fulfilment update.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update_order_status(&self, user: &CurrentUser, order_id: i64, next: OrderStatus) -> Result<Order> {
        require_staff(user)?;
        let order = self.store.find_by_id(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;

        let mut updated = order.clone();
        updated.set_order_status(next, &user.email, Utc::now())?;
        let events = updated.take_events();
        let saved = self.store.save_order_status(&updated, order.order_status()).await?
            .ok_or(EcommerceError::ConcurrentUpdate(order_id))?;

        info!(order_id, from = %order.order_status(), to = %next, "order status updated");
        self.events.publish_all(events).await;
        Ok(saved)
    }

    /// Orders of other customers are reported as missing unless the caller is staff.
    async fn visible_order(&self, user: &CurrentUser, order_id: i64) -> Result<Order> {
        match self.store.find_by_id(order_id).await? {
            Some(order) if user.can_access(&order) => Ok(order),
            _ => Err(EcommerceError::OrderNotFound(order_id)),
        }
    }

    async fn issue_link(&self, order: &Order, actor: &str, client_ip: &str) -> Result<(Order, Vec<DomainEvent>)> {
        let amount = self.conversion.convert(order.total_amount())
            .ok_or_else(|| EcommerceError::Gateway(format!("amount {} cannot be converted for the gateway", order.total_amount())))?;
        let description = format!("Payment for order {}", order.id());
        let now = Utc::now();
        let link = self.links.build(&LinkRequest { order_id: order.id(), amount, description: &description, client_ip }, now)?;

        let mut updated = order.clone();
        let message = format!("Please complete the VNPay payment of {amount} before {}", link.expires_at.format("%Y-%m-%d %H:%M UTC"));
        updated.attach_payment_link(link.record(), message, actor, now)?;
        let events = updated.take_events();

        let saved = self.store.save_payment_link(&updated).await?.ok_or(EcommerceError::AlreadyPaid(order.id()))?;
        info!(order_id = order.id(), external_ref = %link.external_ref, "payment link issued");
        Ok((saved, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(phone: &str, address: &str) -> CheckoutRequest {
        CheckoutRequest { payment_method: PaymentMethod::Cod, phone: phone.into(), address: address.into() }
    }

    #[test]
    fn test_checkout_request_validation() {
        assert!(request("0912345678", "12 Trang Tien").validate().is_ok());
        assert!(request("912345678", "12 Trang Tien").validate().is_err());
        assert!(request("09123456789", "12 Trang Tien").validate().is_err());
        assert!(request("0912345678", "   ").validate().is_err());
    }

    #[test]
    fn test_update_order_status_wire_format() {
        let req: UpdateOrderStatus = serde_json::from_str(r#"{"orderStatus":"SHIPPING"}"#).unwrap();
        assert_eq!(req.order_status, OrderStatus::Shipping);
        assert!(serde_json::from_str::<UpdateOrderStatus>(r#"{"orderStatus":"LOST"}"#).is_err());
    }

    #[test]
    fn test_checkout_request_wire_format() {
        let req: CheckoutRequest = serde_json::from_str(r#"{"paymentMethod":"TRANSFER","phone":"0912345678","address":"HN"}"#).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Transfer);
        assert!(serde_json::from_str::<CheckoutRequest>(r#"{"paymentMethod":"CARD","phone":"0912345678","address":"HN"}"#).is_err());
    }
}
