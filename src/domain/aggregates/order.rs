//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { Cod, Transfer }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipping, Delivered, Cancelled }

impl PaymentStatus {
    /// Legal payment transitions. A declined attempt may be retried; a paid
    /// order can only be refunded, and `Refunded` is terminal.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Failed, Failed) | (Paid, Refunded))
    }

    pub fn is_settled(self) -> bool { matches!(self, Self::Paid | Self::Refunded) }

    /// Message recorded when staff set the status by hand.
    pub fn staff_message(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting payment",
            Self::Paid => "Payment confirmed",
            Self::Failed => "Payment failed",
            Self::Refunded => "Payment refunded",
        }
    }
}

impl OrderStatus {
    /// Fulfilment moves forward only; an order can be cancelled until it ships.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Shipping) | (Confirmed, Cancelled) | (Shipping, Delivered)
        )
    }
}

/// Result of a gateway payment attempt, as reported by a verified callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded { transaction_no: Option<String>, message: String },
    Failed { response_code: String, message: String },
}

impl PaymentOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self { Self::Succeeded { .. } => PaymentStatus::Paid, Self::Failed { .. } => PaymentStatus::Failed }
    }
}

/// Payment session attached to a TRANSFER order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentLinkRecord {
    pub url: String,
    pub external_ref: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) total_amount: i64,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) order_status: OrderStatus,
    pub(crate) payment_url: Option<String>,
    pub(crate) external_ref: Option<String>,
    pub(crate) payment_expires_at: Option<DateTime<Utc>>,
    pub(crate) transaction_no: Option<String>,
    pub(crate) payment_message: Option<String>,
    pub(crate) phone: String,
    pub(crate) address: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) created_by: String,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) updated_by: Option<String>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

/// Line priced from the live product record at checkout time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

impl NewOrderLine {
    pub fn with_ids(self, id: i64, order_id: i64) -> OrderLine {
        OrderLine {
            id, order_id, product_id: self.product_id, product_name: self.product_name,
            unit_price: self.unit_price, quantity: self.quantity, line_total: self.line_total,
        }
    }
}

/// Order not yet persisted. Built by [`NewOrder::place`], which fixes the total
/// to the sum of its line totals and stamps the audit fields.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: i64,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_message: Option<String>,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn place(
        user_id: i64,
        actor: impl Into<String>,
        payment_method: PaymentMethod,
        phone: impl Into<String>,
        address: impl Into<String>,
        lines: Vec<NewOrderLine>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoLines); }
        let total_amount = lines.iter().try_fold(0i64, |acc, l| acc.checked_add(l.line_total)).ok_or(OrderError::TotalOverflow)?;
        Ok(Self {
            user_id, total_amount, payment_method, payment_message: None,
            phone: phone.into(), address: address.into(), created_at: now, created_by: actor.into(), lines,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self { self.payment_message = Some(message.into()); self }

    /// Materializes the order once the store has assigned its id.
    pub fn with_id(&self, id: i64) -> Order {
        let mut order = Order {
            id, user_id: self.user_id, total_amount: self.total_amount, payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending, order_status: OrderStatus::Pending,
            payment_url: None, external_ref: None, payment_expires_at: None, transaction_no: None,
            payment_message: self.payment_message.clone(), phone: self.phone.clone(), address: self.address.clone(),
            created_at: self.created_at, created_by: self.created_by.clone(), updated_at: None, updated_by: None,
            events: vec![],
        };
        order.raise_event(DomainEvent::OrderPlaced {
            order_id: id, user_id: self.user_id, total_amount: self.total_amount, payment_method: self.payment_method,
        });
        order
    }
}

impl Order {
    pub fn id(&self) -> i64 { self.id }
    pub fn user_id(&self) -> i64 { self.user_id }
    pub fn total_amount(&self) -> i64 { self.total_amount }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn order_status(&self) -> OrderStatus { self.order_status }
    pub fn payment_url(&self) -> Option<&str> { self.payment_url.as_deref() }
    pub fn external_ref(&self) -> Option<&str> { self.external_ref.as_deref() }
    pub fn payment_expires_at(&self) -> Option<DateTime<Utc>> { self.payment_expires_at }
    pub fn transaction_no(&self) -> Option<&str> { self.transaction_no.as_deref() }
    pub fn payment_message(&self) -> Option<&str> { self.payment_message.as_deref() }
    pub fn phone(&self) -> &str { &self.phone }
    pub fn address(&self) -> &str { &self.address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn created_by(&self) -> &str { &self.created_by }
    pub fn updated_at(&self) -> Option<DateTime<Utc>> { self.updated_at }
    pub fn updated_by(&self) -> Option<&str> { self.updated_by.as_deref() }

    /// A stored link is reusable while the order still awaits its first payment
    /// and the gateway session has not expired.
    pub fn live_payment_url(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.payment_status != PaymentStatus::Pending { return None; }
        match self.payment_expires_at {
            Some(expires_at) if now >= expires_at => None,
            _ => self.payment_url.as_deref(),
        }
    }

    pub fn attach_payment_link(&mut self, link: PaymentLinkRecord, message: impl Into<String>, actor: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.payment_method != PaymentMethod::Transfer { return Err(OrderError::NotTransfer(self.id)); }
        if self.payment_status.is_settled() { return Err(OrderError::AlreadySettled(self.id)); }
        self.raise_event(DomainEvent::PaymentLinkIssued { order_id: self.id, external_ref: link.external_ref.clone() });
        self.payment_url = Some(link.url);
        self.external_ref = Some(link.external_ref);
        self.payment_expires_at = Some(link.expires_at);
        self.payment_message = Some(message.into());
        self.touch(actor, now);
        Ok(())
    }

    pub fn record_payment(&mut self, outcome: PaymentOutcome, actor: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        let next = outcome.status();
        if !self.payment_status.can_transition_to(next) {
            return Err(OrderError::IllegalPaymentTransition { from: self.payment_status, to: next });
        }
        self.payment_status = next;
        match outcome {
            PaymentOutcome::Succeeded { transaction_no, message } => {
                if transaction_no.is_some() { self.transaction_no = transaction_no.clone(); }
                self.payment_message = Some(message);
                self.raise_event(DomainEvent::PaymentSucceeded { order_id: self.id, transaction_no });
            }
            PaymentOutcome::Failed { response_code, message } => {
                self.payment_message = Some(message);
                self.raise_event(DomainEvent::PaymentFailed { order_id: self.id, response_code });
            }
        }
        self.touch(actor, now);
        Ok(())
    }

    /// Manual payment update by staff, e.g. cash collected on delivery or a refund.
    pub fn set_payment_status(&mut self, next: PaymentStatus, actor: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        let from = self.payment_status;
        if !from.can_transition_to(next) {
            return Err(OrderError::IllegalPaymentTransition { from, to: next });
        }
        self.payment_status = next;
        self.payment_message = Some(next.staff_message().to_string());
        self.touch(actor, now);
        self.raise_event(DomainEvent::PaymentStatusChanged { order_id: self.id, from, to: next, by: actor.to_string() });
        Ok(())
    }

    pub fn set_order_status(&mut self, next: OrderStatus, actor: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        let from = self.order_status;
        if !from.can_transition_to(next) {
            return Err(OrderError::IllegalOrderTransition { from, to: next });
        }
        self.order_status = next;
        self.touch(actor, now);
        self.raise_event(DomainEvent::OrderStatusChanged { order_id: self.id, from, to: next, by: actor.to_string() });
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.updated_by = Some(actor.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no lines")]
    NoLines,
    #[error("Order total overflows")]
    TotalOverflow,
    #[error("Order {0} is not paid by transfer")]
    NotTransfer(i64),
    #[error("Order {0} payment is already settled")]
    AlreadySettled(i64),
    #[error("Payment status cannot move from {from} to {to}")]
    IllegalPaymentTransition { from: PaymentStatus, to: PaymentStatus },
    #[error("Order status cannot move from {from} to {to}")]
    IllegalOrderTransition { from: OrderStatus, to: OrderStatus },
}
