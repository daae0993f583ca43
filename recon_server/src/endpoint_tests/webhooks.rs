use actix_web::{http::StatusCode, test::TestRequest};
use recon_engine::{
    db_types::{DiscrepancyKind, OrderId, OrderIntent, OrderStatusType, PaymentStatus},
    fulfillment_objects::ShipmentUpdateOutcome,
    helpers::signature::{sign, sign_client_confirmation},
    test_utils::prepare_env::{allow_inserts, reject_inserts},
    traits::{DiscrepancyFilter, DiscrepancyManagement, OrderStore, Pagination},
};

use super::{
    harness::{TestSystem, CHECKOUT_SECRET, CONFIRMATION_SECRET, GATEWAY_SECRET, SHIPPING_SECRET},
    helpers::{post_request, send_request, ANONYMOUS},
};

fn signed_post(path: &str, header: &str, secret: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((header.to_string(), sign(body.as_bytes(), secret)))
        .set_payload(body.to_string())
}

fn gateway_event(event: &str, order_ref: &str, payment_id: &str) -> String {
    format!(
        r#"{{"entity":"event","event":"{event}","payload":{{"payment":{{"entity":{{"id":"{payment_id}","order_id":"{order_ref}","method":"card","status":"captured","amount":305000}}}}}}}}"#
    )
}

fn gateway_post(body: &str) -> TestRequest {
    signed_post("/gateway/webhook", "X-Gateway-Signature", GATEWAY_SECRET, body)
}

//----------------------------------------------   Checkout  ----------------------------------------------------

const CHECKOUT: &str = r#"{"order_id":"ord_200","user_id":"user_7","cart":[{"product_id":"prod_kurta","variant_id":"size_s","brand_id":"brand_a","quantity":1,"unit_price":120000,"weight_grams":400}]}"#;

#[actix_web::test]
async fn checkout_must_be_signed() {
    let system = TestSystem::new().await;
    let (status, body) = post_request(ANONYMOUS, "/checkout/intents", CHECKOUT, system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("signature"), "{body}");
    let req = signed_post("/checkout/intents", "X-Checkout-Signature", "not-the-secret", CHECKOUT);
    let (status, _) = send_request(req, system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    system.tear_down().await;
}

#[actix_web::test]
async fn checkout_creates_a_pending_intent() {
    let system = TestSystem::new().await;
    let req = signed_post("/checkout/intents", "X-Checkout-Signature", CHECKOUT_SECRET, CHECKOUT);
    let (status, body) = send_request(req, system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intent: OrderIntent = serde_json::from_str(&body).unwrap();
    assert_eq!(intent.external_ref, OrderId::from("ord_200"));
    assert_eq!(intent.payment_status, PaymentStatus::Pending);
    assert_eq!(intent.total_amount.value(), 120_000);
    // Resubmitting the checkout returns the same intent
    let req = signed_post("/checkout/intents", "X-Checkout-Signature", CHECKOUT_SECRET, CHECKOUT);
    let (status, body) = send_request(req, system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let again: OrderIntent = serde_json::from_str(&body).unwrap();
    assert_eq!(again.id, intent.id);
    system.tear_down().await;
}

#[actix_web::test]
async fn empty_carts_are_rejected() {
    let system = TestSystem::new().await;
    let body = r#"{"order_id":"ord_201","cart":[]}"#;
    let req = signed_post("/checkout/intents", "X-Checkout-Signature", CHECKOUT_SECRET, body);
    let (status, _) = send_request(req, system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    system.tear_down().await;
}

//----------------------------------------------   Gateway  ----------------------------------------------------

#[actix_web::test]
async fn gateway_webhook_rejects_bad_signatures() {
    let system = TestSystem::new().await;
    system.checkout("ord_300").await;
    let body = gateway_event("payment.captured", "ord_300", "pay_1");
    let req = signed_post("/gateway/webhook", "X-Gateway-Signature", CHECKOUT_SECRET, &body);
    let (status, _) = send_request(req, system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let intent = system.db.fetch_intent(&OrderId::from("ord_300")).await.unwrap().unwrap();
    assert_eq!(intent.payment_status, PaymentStatus::Pending);
    system.tear_down().await;
}

#[actix_web::test]
async fn capture_is_applied_once() {
    let system = TestSystem::new().await;
    system.checkout("ord_301").await;
    let body = gateway_event("payment.captured", "ord_301", "pay_1");
    let (status, reply) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, "OK");
    let order = system.db.fetch_order(&OrderId::from("ord_301")).await.unwrap().expect("order was not created");
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
    let log_entries = system.db.fetch_status_log(&order.order_id).await.unwrap().len();
    // Redelivery
    let (status, reply) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, "OK");
    assert_eq!(system.db.fetch_status_log(&order.order_id).await.unwrap().len(), log_entries);
    system.tear_down().await;
}

#[actix_web::test]
async fn second_capture_is_a_discrepancy() {
    let system = TestSystem::new().await;
    system.checkout("ord_302").await;
    let first = gateway_event("payment.captured", "ord_302", "pay_1");
    let (status, _) = send_request(gateway_post(&first), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let second = gateway_event("payment.captured", "ord_302", "pay_2");
    let (status, _) = send_request(gateway_post(&second), system.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let page = system
        .db
        .search_discrepancies(DiscrepancyFilter::default().with_search("ord_302"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].kind, DiscrepancyKind::DuplicateCapture);
    system.tear_down().await;
}

#[actix_web::test]
async fn failure_after_capture_is_rejected() {
    let system = TestSystem::new().await;
    system.checkout("ord_303").await;
    let capture = gateway_event("payment.captured", "ord_303", "pay_1");
    let (status, _) = send_request(gateway_post(&capture), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let failure = gateway_event("payment.failed", "ord_303", "pay_0");
    let (status, _) = send_request(gateway_post(&failure), system.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let order = system.db.fetch_order(&OrderId::from("ord_303")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    system.tear_down().await;
}

#[actix_web::test]
async fn capture_for_an_unknown_order() {
    let system = TestSystem::new().await;
    let body = gateway_event("payment.captured", "ord_ghost", "pay_9");
    let (status, _) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let page = system.db.search_discrepancies(DiscrepancyFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(page.items[0].kind, DiscrepancyKind::UnknownOrderReference);
    assert_eq!(page.items[0].order_ref, "ord_ghost");
    system.tear_down().await;
}

#[actix_web::test]
async fn store_failures_are_not_acknowledged() {
    let system = TestSystem::new().await;
    system.checkout("ord_306").await;
    reject_inserts(&system.db, "orders").await;
    let body = gateway_event("payment.captured", "ord_306", "pay_1");
    let (status, reply) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{reply}");
    assert_ne!(reply, "OK");
    let intent = system.db.fetch_intent(&OrderId::from("ord_306")).await.unwrap().unwrap();
    assert_eq!(intent.payment_status, PaymentStatus::Pending);
    assert!(system.db.fetch_order(&OrderId::from("ord_306")).await.unwrap().is_none());

    // The gateway's redelivery goes through once the store recovers
    allow_inserts(&system.db, "orders").await;
    let (status, reply) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, "OK");
    let order = system.db.fetch_order(&OrderId::from("ord_306")).await.unwrap().expect("order was not created");
    assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
    system.tear_down().await;
}

#[actix_web::test]
async fn unrelated_and_malformed_gateway_events() {
    let system = TestSystem::new().await;
    let body = gateway_event("refund.processed", "ord_304", "pay_1");
    let (status, reply) = send_request(gateway_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, "OK");
    let (status, _) = send_request(gateway_post(r#"{"event":"payment.captured"}"#), system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send_request(gateway_post("not json"), system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    system.tear_down().await;
}

#[actix_web::test]
async fn client_confirmation() {
    let system = TestSystem::new().await;
    system.checkout("ord_305").await;
    let body = r#"{"order_id":"ord_305","payment_id":"pay_5","signature":"00ff"}"#;
    let (status, _) = post_request(ANONYMOUS, "/gateway/confirm", body, system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(system.db.fetch_order(&OrderId::from("ord_305")).await.unwrap().is_none());

    let signature = sign_client_confirmation("ord_305", "pay_5", CONFIRMATION_SECRET);
    let body = format!(r#"{{"order_id":"ord_305","payment_id":"pay_5","signature":"{signature}"}}"#);
    let (status, reply) = post_request(ANONYMOUS, "/gateway/confirm", &body, system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert!(reply.contains("Payment confirmed."), "{reply}");
    // The webhook for the same payment arrives afterwards
    let hook = gateway_event("payment.captured", "ord_305", "pay_5");
    let (status, _) = send_request(gateway_post(&hook), system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, reply) = post_request(ANONYMOUS, "/gateway/confirm", &body, system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("already confirmed"), "{reply}");
    system.tear_down().await;
}

//----------------------------------------------   Shipping  ----------------------------------------------------

fn shipping_post(body: &str) -> TestRequest {
    signed_post("/shipping/webhook", "X-Shipping-Signature", SHIPPING_SECRET, body)
}

#[actix_web::test]
async fn shipping_webhook_must_be_signed() {
    let system = TestSystem::new().await;
    let body = r#"{"awb":"AWB00000001","current_status":"Delivered"}"#;
    let (status, _) = post_request(ANONYMOUS, "/shipping/webhook", body, system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    system.tear_down().await;
}

#[actix_web::test]
async fn orphan_callbacks_are_acknowledged() {
    let system = TestSystem::new().await;
    let body = r#"{"awb":"AWB_UNKNOWN","current_status":"In Transit"}"#;
    let (status, reply) = send_request(shipping_post(body), system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    let outcome: ShipmentUpdateOutcome = serde_json::from_str(&reply).unwrap();
    assert!(outcome.shipment.is_none());
    assert_eq!(outcome.discrepancies.len(), 1);
    assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::OrphanShipmentCallback);
    system.tear_down().await;
}

#[actix_web::test]
async fn pickup_ships_the_order() {
    let system = TestSystem::new().await;
    let order = system.paid_order("ord_400").await;
    let shipment = system.ship(order).await;
    let awb = shipment.awb_number.clone().expect("shipment has no AWB");
    let body = format!(r#"{{"awb_code":"{awb}","shipment_status":"Picked Up","weight_grams":5000}}"#);
    let (status, reply) = send_request(shipping_post(&body), system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    let outcome: ShipmentUpdateOutcome = serde_json::from_str(&reply).unwrap();
    assert_eq!(outcome.order_status, Some(OrderStatusType::Shipped));
    assert!(outcome.discrepancies.iter().any(|d| d.kind == DiscrepancyKind::ShipmentWeightMismatch));
    let order = system.db.fetch_order(&OrderId::from("ord_400")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Shipped);
    system.tear_down().await;
}

#[actix_web::test]
async fn malformed_tracking_callback() {
    let system = TestSystem::new().await;
    let (status, _) = send_request(shipping_post(r#"{"status":"Delivered"}"#), system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    system.tear_down().await;
}
