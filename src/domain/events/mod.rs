//! Domain events
use serde::Serialize;

use crate::domain::aggregates::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced { order_id: i64, user_id: i64, total_amount: i64, payment_method: PaymentMethod },
    PaymentLinkIssued { order_id: i64, external_ref: String },
    PaymentSucceeded { order_id: i64, transaction_no: Option<String> },
    PaymentFailed { order_id: i64, response_code: String },
    PaymentStatusChanged { order_id: i64, from: PaymentStatus, to: PaymentStatus, by: String },
    OrderStatusChanged { order_id: i64, from: OrderStatus, to: OrderStatus, by: String },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "orders.placed",
            Self::PaymentLinkIssued { .. } => "payments.link_issued",
            Self::PaymentSucceeded { .. } => "payments.succeeded",
            Self::PaymentFailed { .. } => "payments.failed",
            Self::PaymentStatusChanged { .. } => "payments.status_changed",
            Self::OrderStatusChanged { .. } => "orders.status_changed",
        }
    }

    pub fn order_id(&self) -> i64 {
        match self {
            Self::OrderPlaced { order_id, .. }
            | Self::PaymentLinkIssued { order_id, .. }
            | Self::PaymentSucceeded { order_id, .. }
            | Self::PaymentFailed { order_id, .. }
            | Self::PaymentStatusChanged { order_id, .. }
            | Self::OrderStatusChanged { order_id, .. } => *order_id,
        }
    }
}
