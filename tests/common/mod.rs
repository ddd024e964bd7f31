#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use storefront_checkout::config::{AppConfig, GatewayConfig};
use storefront_checkout::domain::aggregates::{CurrentUser, Order, PaymentMethod, Product};
use storefront_checkout::domain::value_objects::{CurrencyConversion, RateConversion};
use storefront_checkout::messaging::EventPublisher;
use storefront_checkout::payment::{canonicalize, Checksum, PaymentLinkBuilder, SIGNATURE_FIELD, SIGNATURE_TYPE_FIELD};
use storefront_checkout::services::{CheckoutRequest, OrderService, PaymentService};
use storefront_checkout::store::MemoryStore;

pub const SECRET: &str = "TESTSECRETKEY";
pub const MUG: i64 = 1;
pub const TEA_SET: i64 = 2;

pub fn env() -> HashMap<String, String> {
    [
        ("DATABASE_URL", "postgres://localhost/shop"),
        ("VNPAY_PAY_URL", "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"),
        ("VNPAY_RETURN_URL", "http://localhost:8080/api/v1/payment/vnpay-return"),
        ("VNPAY_TMN_CODE", "TESTCODE"),
        ("VNPAY_HASH_SECRET", SECRET),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn config() -> AppConfig {
    let vars = env();
    AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap()
}

pub fn gateway() -> GatewayConfig {
    config().gateway
}

pub fn buyer() -> CurrentUser {
    CurrentUser::new(7, "buyer@example.com")
}

/// Mug: 50 000, ten in stock. Tea set: 150 000, one in stock.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.put_product(Product::new(MUG, "Ceramic mug", 50_000, 10)).await;
    store.put_product(Product::new(TEA_SET, "Tea set", 150_000, 1)).await;
    store
}

pub fn staff() -> CurrentUser {
    CurrentUser::new(100, "staff@example.com").with_roles(["employee"])
}

pub fn order_service_with(store: &MemoryStore, conversion: Arc<dyn CurrencyConversion>) -> OrderService {
    order_service_for(store, gateway(), conversion)
}

pub fn order_service_for(store: &MemoryStore, gateway: GatewayConfig, conversion: Arc<dyn CurrencyConversion>) -> OrderService {
    let links = PaymentLinkBuilder::new(gateway).unwrap();
    OrderService::new(Arc::new(store.clone()), links, conversion, EventPublisher::disabled())
}

pub fn order_service(store: &MemoryStore) -> OrderService {
    order_service_with(store, Arc::new(RateConversion::identity()))
}

pub fn payment_service(store: &MemoryStore) -> PaymentService {
    PaymentService::new(Arc::new(store.clone()), Checksum::new(SECRET).unwrap(), EventPublisher::disabled())
}

pub fn checkout(method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest { payment_method: method, phone: "0912345678".into(), address: "12 Trang Tien, Hoan Kiem".into() }
}

/// Places a TRANSFER order for the tea set on behalf of [`buyer`].
pub async fn place_transfer(store: &MemoryStore) -> Order {
    store.add_to_cart(buyer().id, TEA_SET, 1).await;
    order_service(store).place_order(&buyer(), checkout(PaymentMethod::Transfer), "10.0.0.5").await.unwrap().order
}

/// Places a COD order for one mug on behalf of [`buyer`].
pub async fn place_cod(store: &MemoryStore) -> Order {
    store.add_to_cart(buyer().id, MUG, 1).await;
    order_service(store).place_order(&buyer(), checkout(PaymentMethod::Cod), "10.0.0.5").await.unwrap().order
}

/// Gateway-style callback parameters signed with the merchant secret.
pub fn sign_callback(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let canonical = canonicalize(pairs.iter().copied());
    let signature = Checksum::new(SECRET).unwrap().sign(&canonical);
    let mut params: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    params.insert(SIGNATURE_TYPE_FIELD.to_string(), "HmacSHA512".to_string());
    params.insert(SIGNATURE_FIELD.to_string(), signature);
    params
}

pub fn callback_for(reference: &str, response_code: &str, transaction_status: &str) -> HashMap<String, String> {
    sign_callback(&[
        ("vnp_TxnRef", reference),
        ("vnp_ResponseCode", response_code),
        ("vnp_TransactionStatus", transaction_status),
        ("vnp_Amount", "15000000"),
        ("vnp_BankCode", "NCB"),
        ("vnp_TransactionNo", "14000123"),
        ("vnp_PayDate", "20240502003512"),
        ("vnp_OrderInfo", "Payment for order"),
    ])
}
