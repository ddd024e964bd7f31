mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::form_urlencoded;

use common::*;
use storefront_checkout::http::{router, AppState};
use storefront_checkout::messaging::EventPublisher;
use storefront_checkout::domain::aggregates::PaymentStatus;
use storefront_checkout::store::{MemoryStore, OrderRepository};

fn app(store: &MemoryStore) -> Router {
    router(AppState::new(Arc::new(store.clone()), &config(), EventPublisher::disabled()).unwrap())
}

fn as_buyer(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header("x-user-id", "7").header("x-user-email", "buyer@example.com")
}

fn as_staff(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header("x-user-id", "100").header("x-user-email", "staff@example.com").header("x-user-roles", "employee")
}

fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

fn encode(params: &HashMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(params.iter()).finish()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn checkout_body(method: &str) -> Body {
    Body::from(json!({"paymentMethod": method, "phone": "0912345678", "address": "12 Trang Tien"}).to_string())
}

#[tokio::test]
async fn test_health() {
    let store = seeded_store().await;
    let response = app(&store).oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_order_requires_identity() {
    let store = seeded_store().await;
    let request = Request::post("/api/v1/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(checkout_body("COD"))
        .unwrap();

    let response = app(&store).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_create_transfer_order() {
    let store = seeded_store().await;
    store.add_to_cart(7, TEA_SET, 1).await;
    let request = as_buyer(Request::post("/api/v1/orders"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(checkout_body("TRANSFER"))
        .unwrap();

    let response = app(&store).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let url = body["paymentUrl"].as_str().unwrap();
    assert!(url.contains("vnp_Amount=15000000"));
    assert!(url.contains("vnp_IpAddr=203.0.113.7"));
    assert_eq!(body["order"]["paymentStatus"], "PENDING");
    assert_eq!(body["order"]["totalAmount"], 150_000);
    assert_eq!(body["lines"][0]["productName"], "Tea set");
}

#[tokio::test]
async fn test_empty_cart_is_a_bad_request() {
    let store = seeded_store().await;
    let request = as_buyer(Request::post("/api/v1/orders"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(checkout_body("COD"))
        .unwrap();

    let response = app(&store).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Cart is empty");
}

#[tokio::test]
async fn test_create_payment_returns_stored_link() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let request = as_buyer(Request::get(format!("/api/v1/payment/create-payment/{}", order.id()))).body(Body::empty()).unwrap();

    let response = app(&store).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["paymentUrl"], order.payment_url().unwrap());
}

#[tokio::test]
async fn test_gateway_return_redirects_to_frontend() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let params = callback_for(order.external_ref().unwrap(), "00", "00");
    let uri = format!("/api/v1/payment/vnpay-return/{}?{}", order.id(), encode(&params));

    let response = app(&store).oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://localhost:3000/payment-result?"));
    assert!(location.contains("status=success"));
    assert!(location.contains(&format!("orderId={}", order.id())));
}

#[tokio::test]
async fn test_forged_return_redirects_with_failure() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let mut params = callback_for(order.external_ref().unwrap(), "00", "00");
    params.insert("vnp_ResponseCode".into(), "24".into());

    let uri = format!("/api/v1/payment/vnpay-return?{}", encode(&params));
    let response = app(&store).oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("status=failed"));
    assert!(location.contains(&format!("orderId={}", order.id())));
}

#[tokio::test]
async fn test_process_payment_and_status_snapshot() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let params = callback_for(order.external_ref().unwrap(), "00", "00");
    let app = app(&store);

    let uri = format!("/api/v1/vnpay/process-payment?{}", encode(&params));
    let response = app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["applied"], true);
    assert_eq!(body["paymentStatus"], "PAID");
    assert_eq!(body["gatewayInfo"]["amount"], 150_000);
    assert_eq!(body["gatewayInfo"]["bankCode"], "NCB");

    let replay = body_json(app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap()).await;
    assert_eq!(replay["applied"], false);
    assert_eq!(replay["success"], true);

    let uri = format!("/api/v1/vnpay/payment-status/{}", order.id());
    let snapshot = body_json(app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap()).await;
    assert_eq!(snapshot["paymentStatus"], "PAID");
    assert_eq!(snapshot["paymentMethod"], "TRANSFER");
    assert_eq!(snapshot["transactionNo"], "14000123");
    assert_eq!(snapshot["totalPrice"], 150_000);
}

#[tokio::test]
async fn test_process_payment_rejects_bad_signature() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let mut params = callback_for(order.external_ref().unwrap(), "00", "00");
    params.insert("vnp_TransactionNo".into(), "1".into());

    let uri = format!("/api/v1/vnpay/process-payment?{}", encode(&params));
    let response = app(&store).oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid payment signature");
}

#[tokio::test]
async fn test_return_path_must_match_reference() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let params = callback_for(order.external_ref().unwrap(), "00", "00");
    let uri = format!("/api/v1/payment/vnpay-return/{}?{}", order.id() + 1, encode(&params));

    let response = app(&store).oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("status=failed"));
    assert!(location.contains(&format!("orderId={}", order.id() + 1)));
    let stored = store.find_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.payment_status(), PaymentStatus::Pending);
}

#[tokio::test]
async fn test_my_orders_route_is_not_an_order_id() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;

    let response = app(&store).oneshot(as_buyer(Request::get("/api/v1/orders/my-orders")).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["order"]["id"], order.id());
    assert_eq!(body[0]["lines"][0]["productName"], "Tea set");
}

#[tokio::test]
async fn test_status_updates_are_staff_only() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let app = app(&store);
    let uri = format!("/api/v1/orders/{}/update-order-status", order.id());

    let forbidden = as_buyer(Request::put(&uri))
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(json!({"orderStatus": "CONFIRMED"})))
        .unwrap();
    let response = app.clone().oneshot(forbidden).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let confirm = as_staff(Request::put(&uri))
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(json!({"orderStatus": "CONFIRMED"})))
        .unwrap();
    let response = app.clone().oneshot(confirm).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["order"]["orderStatus"], "CONFIRMED");

    let skip = as_staff(Request::put(&uri))
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(json!({"orderStatus": "DELIVERED"})))
        .unwrap();
    assert_eq!(app.oneshot(skip).await.unwrap().status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_payment_update_and_payment_info() {
    let store = seeded_store().await;
    let order = place_transfer(&store).await;
    let app = app(&store);

    let update = as_staff(Request::put(format!("/api/v1/orders/{}/update-payment-status", order.id())))
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(json!({"paymentStatus": "PAID"})))
        .unwrap();
    let response = app.clone().oneshot(update).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["order"]["paymentStatus"], "PAID");

    let uri = format!("/api/v1/payment/payment-info/{}", order.id());
    let info = body_json(app.clone().oneshot(as_buyer(Request::get(&uri)).body(Body::empty()).unwrap()).await.unwrap()).await;
    assert_eq!(info["success"], true);
    assert_eq!(info["paymentStatus"], "PAID");
    assert_eq!(info["paymentMethod"], "TRANSFER");
    assert_eq!(info["paymentMessage"], "Payment confirmed");
    assert_eq!(info["totalPrice"], 150_000);

    let stranger = Request::get(&uri).header("x-user-id", "99").header("x-user-email", "s@example.com").body(Body::empty()).unwrap();
    let response = app.oneshot(stranger).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], false);
}
