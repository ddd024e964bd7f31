//! Reconciliation of gateway callbacks against stored orders.
//!
//! Both the browser redirect and the relayed confirmation go through
//! [`PaymentService::reconcile`]. The write is a compare-and-swap on the
//! payment status, so concurrent or replayed deliveries apply at most once.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::aggregates::{CurrentUser, Order, OrderError, PaymentMethod, PaymentStatus};
use crate::messaging::EventPublisher;
use crate::payment::{Checksum, GatewayCallback};
use crate::services::require_staff;
use crate::store::Store;
use crate::{EcommerceError, Result};

/// Recorded as `updated_by` for changes driven by the gateway.
pub const GATEWAY_ACTOR: &str = "vnpay";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub order: Order,
    /// `false` when the callback changed nothing (already paid, replay, lost race).
    pub applied: bool,
    pub callback: GatewayCallback,
}

impl ReconcileResult {
    pub fn is_paid(&self) -> bool { self.order.payment_status() == PaymentStatus::Paid }

    pub fn message(&self) -> String {
        self.order.payment_message().map(str::to_string).unwrap_or_else(|| self.order.payment_status().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatus {
    pub payment_status: PaymentStatus,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    checksum: Checksum,
    events: EventPublisher,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, checksum: Checksum, events: EventPublisher) -> Self {
        Self { store, checksum, events }
    }

    #[instrument(skip_all)]
    pub async fn reconcile(&self, params: &HashMap<String, String>) -> Result<ReconcileResult> {
        if !self.checksum.verify_params(params) {
            warn!(reference = params.get("vnp_TxnRef").map(String::as_str), "rejected gateway callback with an invalid signature");
            return Err(EcommerceError::SignatureInvalid);
        }

        let callback = GatewayCallback::from_params(params)?;
        let order_id = callback.order_id()?;
        let order = match self.store.find_by_external_ref(&callback.reference).await? {
            Some(order) => order,
            None => self.store.find_by_id(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?,
        };
        if order.payment_method() != PaymentMethod::Transfer {
            warn!(order_id, method = %order.payment_method(), "gateway callback for an order not paid by transfer");
            return Err(EcommerceError::InvalidPaymentMethod);
        }

        if order.payment_status() == PaymentStatus::Paid {
            debug!(order_id, "callback for an already paid order ignored");
            return Ok(ReconcileResult { order, applied: false, callback });
        }

        let expected = order.payment_status();
        let mut updated = order.clone();
        match updated.record_payment(callback.outcome(order.total_amount()), GATEWAY_ACTOR, Utc::now()) {
            Ok(()) => {}
            Err(OrderError::IllegalPaymentTransition { from, to }) => {
                debug!(order_id, %from, %to, "callback does not move the payment status");
                return Ok(ReconcileResult { order, applied: false, callback });
            }
            Err(e) => return Err(e.into()),
        }
        let events = updated.take_events();

        let Some(saved) = self.store.save_payment_outcome(&updated, expected).await? else {
            let current = self.store.find_by_id(order.id()).await?.ok_or(EcommerceError::OrderNotFound(order.id()))?;
            debug!(order_id, status = %current.payment_status(), "concurrent callback won the update");
            return Ok(ReconcileResult { order: current, applied: false, callback });
        };

        info!(
            order_id,
            status = %saved.payment_status(),
            response_code = %callback.response_code,
            transaction_no = callback.transaction_no.as_deref(),
            "payment reconciled"
        );
        self.events.publish_all(events).await;
        Ok(ReconcileResult { order: saved, applied: true, callback })
    }

    pub async fn payment_status(&self, order_id: i64) -> Result<Order> {
        self.store.find_by_id(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))
    }

    /// Payment snapshot for the order's owner or staff.
    pub async fn payment_info(&self, user: &CurrentUser, order_id: i64) -> Result<Order> {
        match self.store.find_by_id(order_id).await? {
            Some(order) if user.can_access(&order) => Ok(order),
            _ => Err(EcommerceError::OrderNotFound(order_id)),
        }
    }

    /// Staff-only manual payment update, e.g. cash collected for a COD order or a refund.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update_payment_status(&self, user: &CurrentUser, order_id: i64, next: PaymentStatus) -> Result<Order> {
        require_staff(user)?;
        let order = self.store.find_by_id(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;

        let mut updated = order.clone();
        updated.set_payment_status(next, &user.email, Utc::now())?;
        let events = updated.take_events();
        let saved = self.store.save_payment_outcome(&updated, order.payment_status()).await?
            .ok_or(EcommerceError::ConcurrentUpdate(order_id))?;

        info!(order_id, from = %order.payment_status(), to = %next, "payment status updated by staff");
        self.events.publish_all(events).await;
        Ok(saved)
    }
}
