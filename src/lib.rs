//! Storefront Checkout
//!
//! Order placement and VNPay payment reconciliation for the storefront backend.
//!
//! ## Features
//! - Cart to order checkout with atomic inventory decrement
//! - Signed VNPay payment links (HMAC-SHA512)
//! - Idempotent reconciliation of gateway redirects and confirmations
//! - Staff order and payment status updates
//! - Domain events published over NATS

pub mod config;
pub mod domain;
pub mod http;
pub mod messaging;
pub mod payment;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::OrderError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for product {product}")]
    InsufficientStock { product: String },

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Payment method does not accept payment links; only TRANSFER does")]
    InvalidPaymentMethod,

    #[error("Order {0} is already paid")]
    AlreadyPaid(i64),

    #[error("Invalid payment signature")]
    SignatureInvalid,

    #[error("Invalid payment reference: {0}")]
    InvalidReference(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Order {0} was modified concurrently, reload and retry")]
    ConcurrentUpdate(i64),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
