//! HTTP surface: router, shared state and handlers.

pub mod error;
pub mod extract;
pub mod handlers;

use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use url::Url;

use crate::config::AppConfig;
use crate::messaging::EventPublisher;
use crate::payment::PaymentLinkBuilder;
use crate::services::{OrderService, PaymentService};
use crate::store::Store;
use crate::Result;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub frontend_result_url: Url,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig, events: EventPublisher) -> Result<Self> {
        let links = PaymentLinkBuilder::new(config.gateway.clone())?;
        let payments = PaymentService::new(store.clone(), links.checksum().clone(), events.clone());
        let orders = OrderService::new(store, links, Arc::new(config.conversion.clone()), events);
        Ok(Self {
            orders: Arc::new(orders),
            payments: Arc::new(payments),
            frontend_result_url: config.frontend_result_url.clone(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/orders", post(handlers::create_order))
        .route("/api/v1/orders/my-orders", get(handlers::my_orders))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/orders/:id/update-order-status", put(handlers::update_order_status))
        .route("/api/v1/orders/:id/update-payment-status", put(handlers::update_payment_status))
        .route("/api/v1/payment/create-payment/:order_id", get(handlers::create_payment))
        .route("/api/v1/payment/vnpay-return", get(handlers::vnpay_return))
        .route("/api/v1/payment/vnpay-return/:order_id", get(handlers::vnpay_return_for_order))
        .route("/api/v1/payment/payment-info/:order_id", get(handlers::payment_info))
        .route("/api/v1/vnpay/process-payment", get(handlers::process_payment))
        .route("/api/v1/vnpay/payment-status/:order_id", get(handlers::payment_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
