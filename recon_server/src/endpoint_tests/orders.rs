use actix_web::http::StatusCode;
use recon_engine::{
    db_types::{Order, OrderStatusType},
    order_objects::OrderDetails,
};

use super::{
    harness::TestSystem,
    helpers::{get_request, patch_request, post_request, ADMIN, ANONYMOUS, BRAND_A, BRAND_Z},
};

#[actix_web::test]
async fn order_details_need_an_actor() {
    let system = TestSystem::new().await;
    system.paid_order("ord_100").await;
    let (status, body) = get_request(ANONYMOUS, "/api/orders/ord_100", system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No actor identity"), "{body}");
    let bad_role = &[("X-Actor-Id", "someone"), ("X-Actor-Role", "buyer")];
    let (status, _) = get_request(bad_role, "/api/orders/ord_100", system.configure()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    system.tear_down().await;
}

#[actix_web::test]
async fn admin_sees_the_full_order() {
    let system = TestSystem::new().await;
    system.paid_order("ord_101").await;
    let (status, body) = get_request(ADMIN, "/api/orders/ord_101", system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    let order = details.order.expect("order is missing");
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(details.items.len(), 2);
    assert!(details.intent.is_some());
    assert!(!details.status_log.is_empty());
    system.tear_down().await;
}

#[actix_web::test]
async fn pending_checkouts_show_only_the_intent() {
    let system = TestSystem::new().await;
    system.checkout("ord_102").await;
    let (status, body) = get_request(BRAND_A, "/api/orders/ord_102", system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert!(details.order.is_none());
    assert!(details.items.is_empty());
    system.tear_down().await;
}

#[actix_web::test]
async fn brands_only_see_their_own_orders() {
    let system = TestSystem::new().await;
    system.paid_order("ord_103").await;
    let (status, _) = get_request(BRAND_A, "/api/orders/ord_103", system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = get_request(BRAND_Z, "/api/orders/ord_103", system.configure()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("ord_103"), "{body}");
    system.tear_down().await;
}

#[actix_web::test]
async fn unknown_order() {
    let system = TestSystem::new().await;
    let (status, body) = get_request(ADMIN, "/api/orders/ord_nope", system.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Order ord_nope does not exist"}"#);
    system.tear_down().await;
}

#[actix_web::test]
async fn brand_ships_its_order() {
    let system = TestSystem::new().await;
    system.paid_order("ord_104").await;
    let body = r#"{"status":"shipped","reason":"Handed to courier"}"#;
    let (status, body) = patch_request(BRAND_A, "/api/orders/ord_104/status", body, system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Shipped);
    assert!(system.cache.invalidations() > 0);
    // Same status again is a no-op
    let body = r#"{"status":"Shipped"}"#;
    let (status, body) = patch_request(BRAND_A, "/api/orders/ord_104/status", body, system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("already Shipped"), "{body}");
    system.tear_down().await;
}

#[actix_web::test]
async fn status_cannot_go_backwards() {
    let system = TestSystem::new().await;
    system.paid_order("ord_105").await;
    let (status, _) =
        patch_request(ADMIN, "/api/orders/ord_105/status", r#"{"status":"Shipped"}"#, system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) =
        patch_request(ADMIN, "/api/orders/ord_105/status", r#"{"status":"Cancelled"}"#, system.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Shipped to Cancelled"), "{body}");
    system.tear_down().await;
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_changed() {
    let system = TestSystem::new().await;
    system.checkout("ord_106").await;
    let (status, body) =
        patch_request(ADMIN, "/api/orders/ord_106/status", r#"{"status":"Shipped"}"#, system.configure()).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED, "{body}");
    system.tear_down().await;
}

#[actix_web::test]
async fn foreign_brand_cannot_change_an_order() {
    let system = TestSystem::new().await;
    system.paid_order("ord_107").await;
    let (status, _) =
        patch_request(BRAND_Z, "/api/orders/ord_107/status", r#"{"status":"Cancelled"}"#, system.configure()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    system.tear_down().await;
}

#[actix_web::test]
async fn unknown_status_name() {
    let system = TestSystem::new().await;
    system.paid_order("ord_108").await;
    let (status, _) =
        patch_request(ADMIN, "/api/orders/ord_108/status", r#"{"status":"Lost"}"#, system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = patch_request(ADMIN, "/api/orders/ord_108/status", r#"{"state":1}"#, system.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    system.tear_down().await;
}

#[actix_web::test]
async fn shipment_documents() {
    let system = TestSystem::new().await;
    let order = system.paid_order("ord_109").await;
    let shipment = system.ship(order).await;
    let path = format!("/api/shipments/{}/label", shipment.id);
    let (status, _) = get_request(BRAND_A, &path, system.configure()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = get_request(ADMIN, &path, system.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("%PDF"));
    // A provider that returns something other than a PDF is a bad gateway, not a broken label
    system.provider.set_document(b"<html>Rate limited</html>", None);
    let path = format!("/api/shipments/{}/manifest", shipment.id);
    let (status, _) = get_request(ADMIN, &path, system.configure()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (status, _) = get_request(ADMIN, "/api/shipments/9999/label", system.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    system.tear_down().await;
}

#[actix_web::test]
async fn retry_a_failed_shipment() {
    let system = TestSystem::new().await;
    let order = system.paid_order("ord_110").await;
    system.provider.set_fail_on_create(true);
    let _ = system.ship(order).await;
    system.provider.set_fail_on_create(false);
    let (status, body) = post_request(ADMIN, "/api/orders/ord_110/shipment", "", system.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("AWB"), "{body}");
    assert_eq!(system.provider.create_calls(), 2);
    system.tear_down().await;
}
