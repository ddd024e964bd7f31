//! Application services
pub mod order_service;
pub mod payment_service;

pub use order_service::{CheckoutRequest, OrderDetails, OrderService, PlacedOrder, UpdateOrderStatus};
pub use payment_service::{PaymentService, ReconcileResult, UpdatePaymentStatus, GATEWAY_ACTOR};

use crate::domain::aggregates::CurrentUser;
use crate::{EcommerceError, Result};

/// Back-office operations are limited to admins and employees.
pub(crate) fn require_staff(user: &CurrentUser) -> Result<()> {
    if user.is_staff() { Ok(()) } else { Err(EcommerceError::Forbidden) }
}
