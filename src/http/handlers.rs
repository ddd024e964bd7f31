//! Route handlers.

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::domain::aggregates::CurrentUser;
use crate::domain::value_objects::ExternalRef;
use crate::http::extract::client_ip;
use crate::http::AppState;
use crate::payment::callback::REFERENCE_FIELD;
use crate::services::{CheckoutRequest, OrderDetails, PlacedOrder, ReconcileResult, UpdateOrderStatus, UpdatePaymentStatus};
use crate::{EcommerceError, Result};

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "storefront-checkout"}))
}

pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let placed = state.orders.place_order(&user, req, &ip).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

pub async fn get_order(State(state): State<AppState>, user: CurrentUser, Path(id): Path<i64>) -> Result<Json<Value>> {
    let (order, lines) = state.orders.order_with_lines(&user, id).await?;
    Ok(Json(json!({"order": order, "lines": lines})))
}

pub async fn my_orders(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(state.orders.my_orders(&user).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateOrderStatus>,
) -> Result<Json<Value>> {
    let order = state.orders.update_order_status(&user, id, req.order_status).await?;
    Ok(Json(json!({"success": true, "message": "Order status updated", "order": order})))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePaymentStatus>,
) -> Result<Json<Value>> {
    let order = state.payments.update_payment_status(&user, id, req.payment_status).await?;
    Ok(Json(json!({"success": true, "message": "Payment status updated", "order": order})))
}

pub async fn create_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<Value>> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let url = state.orders.payment_url(&user, order_id, &ip).await?;
    Ok(Json(json!({"success": true, "orderId": order_id, "paymentUrl": url})))
}

/// Browser return from the gateway. Always answers with a redirect to the
/// frontend result page; failures are reported through its query string.
pub async fn vnpay_return(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Redirect {
    return_redirect(&state, &params, None).await
}

/// Return URL variant carrying the order id in the path. The reference must
/// name the same order, otherwise nothing is reconciled.
pub async fn vnpay_return_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    return_redirect(&state, &params, Some(order_id)).await
}

async fn return_redirect(state: &AppState, params: &HashMap<String, String>, expected: Option<i64>) -> Redirect {
    let referenced = params.get(REFERENCE_FIELD).and_then(|r| ExternalRef::order_id(r).ok());
    let outcome = match expected {
        Some(id) if referenced != Some(id) => {
            let reference = params.get(REFERENCE_FIELD).cloned().unwrap_or_default();
            Err(EcommerceError::InvalidReference(reference))
        }
        _ => state.payments.reconcile(params).await,
    };

    let (status, order_id, message) = match outcome {
        Ok(result) => {
            let status = if result.is_paid() { "success" } else { "failed" };
            (status, Some(result.order.id()), result.message())
        }
        Err(e) => {
            let order_id = expected.or(referenced);
            tracing::info!(order_id, error = %e, "payment return rejected");
            ("failed", order_id, e.response_message())
        }
    };

    let mut target = state.frontend_result_url.clone();
    {
        let mut query = target.query_pairs_mut();
        query.append_pair("status", status);
        if let Some(id) = order_id {
            query.append_pair("orderId", &id.to_string());
        }
        query.append_pair("message", &message);
    }
    Redirect::to(target.as_str())
}

/// Confirmation relayed by the frontend with the gateway's signed parameters.
pub async fn process_payment(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Result<Json<Value>> {
    let result = state.payments.reconcile(&params).await?;
    Ok(Json(confirmation(&result)))
}

pub async fn payment_status(State(state): State<AppState>, Path(order_id): Path<i64>) -> Result<Json<Value>> {
    let order = state.payments.payment_status(order_id).await?;
    Ok(Json(json!({
        "success": true,
        "orderId": order.id(),
        "paymentStatus": order.payment_status(),
        "orderStatus": order.order_status(),
        "paymentMethod": order.payment_method(),
        "paymentMessage": order.payment_message(),
        "paymentUrl": order.payment_url(),
        "totalPrice": order.total_amount(),
        "transactionNo": order.transaction_no(),
    })))
}

/// Payment snapshot restricted to the order's owner and staff.
pub async fn payment_info(State(state): State<AppState>, user: CurrentUser, Path(order_id): Path<i64>) -> Result<Json<Value>> {
    let order = state.payments.payment_info(&user, order_id).await?;
    Ok(Json(json!({
        "success": true,
        "orderId": order.id(),
        "paymentStatus": order.payment_status(),
        "paymentMethod": order.payment_method(),
        "paymentMessage": order.payment_message(),
        "totalPrice": order.total_amount(),
        "transactionNo": order.transaction_no(),
    })))
}

fn confirmation(result: &ReconcileResult) -> Value {
    let callback = &result.callback;
    json!({
        "success": result.is_paid(),
        "orderId": result.order.id(),
        "paymentStatus": result.order.payment_status(),
        "orderStatus": result.order.order_status(),
        "message": result.message(),
        "applied": result.applied,
        "gatewayInfo": {
            "amount": callback.display_amount(),
            "bankCode": callback.bank_code,
            "transactionNo": callback.transaction_no,
            "payDate": callback.pay_date,
            "responseCode": callback.response_code,
            "transactionStatus": callback.transaction_status,
        },
    })
}
