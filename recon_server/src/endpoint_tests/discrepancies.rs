use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use mockall::predicate::eq;
use recon_engine::{
    db_types::{Discrepancy, DiscrepancyKind},
    traits::{DiscrepancyFilter, Page, Pagination, StoreError},
    DiscrepancyApi,
};

use super::{
    helpers::{get_request, post_request, ADMIN, ANONYMOUS, BRAND_A},
    mocks::MockDiscrepancyStore,
};
use crate::routes::{DiscrepanciesRoute, DiscrepancyByIdRoute, ResolveDiscrepancyRoute};

#[actix_web::test]
async fn list_requires_an_actor() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(ANONYMOUS, "/discrepancies", configure(MockDiscrepancyStore::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No actor identity"), "{body}");
}

#[actix_web::test]
async fn brands_cannot_list_discrepancies() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request(BRAND_A, "/discrepancies", configure(MockDiscrepancyStore::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn list_passes_filters_to_the_store() {
    let _ = env_logger::try_init().ok();
    let mut store = MockDiscrepancyStore::new();
    store
        .expect_search_discrepancies()
        .with(
            eq(DiscrepancyFilter::default().with_resolved(false).with_search("ord_7")),
            eq(Pagination { offset: 0, count: 10 }),
        )
        .times(1)
        .returning(|_, p| Ok(Page::new(1, p, vec![discrepancy(false)])));
    let (status, body) =
        get_request(ADMIN, "/discrepancies?resolved=false&search=ord_7&count=10", configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let page: Page<Discrepancy> = serde_json::from_str(&body).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.count, 10);
    assert_eq!(page.items[0].kind, DiscrepancyKind::DuplicateCapture);
}

#[actix_web::test]
async fn fetch_unknown_discrepancy() {
    let _ = env_logger::try_init().ok();
    let mut store = MockDiscrepancyStore::new();
    store.expect_fetch_discrepancy().with(eq(99)).returning(|_| Ok(None));
    let (status, body) = get_request(ADMIN, "/discrepancies/99", configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("99"), "{body}");
}

#[actix_web::test]
async fn resolve_records_the_actor() {
    let _ = env_logger::try_init().ok();
    let mut store = MockDiscrepancyStore::new();
    store
        .expect_resolve_discrepancy()
        .withf(|id, by, note| *id == 4 && by.to_string() == "admin:ops_1" && note.to_string() == "Refunded the second capture")
        .times(1)
        .returning(|_, _, _| Ok(discrepancy(true)));
    let body = r#"{"note":"  Refunded the second capture "}"#;
    let (status, body) = post_request(ADMIN, "/discrepancies/4/resolve", body, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let d: Discrepancy = serde_json::from_str(&body).unwrap();
    assert!(d.resolved);
    assert_eq!(d.resolved_by.as_deref(), Some("admin:ops_1"));
}

#[actix_web::test]
async fn resolve_needs_a_note() {
    let _ = env_logger::try_init().ok();
    let mut store = MockDiscrepancyStore::new();
    store.expect_resolve_discrepancy().never();
    let (status, _) = post_request(ADMIN, "/discrepancies/4/resolve", r#"{"note":"   "}"#, configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn resolving_twice_fails_the_precondition() {
    let _ = env_logger::try_init().ok();
    let mut store = MockDiscrepancyStore::new();
    store.expect_resolve_discrepancy().returning(|id, _, _| Err(StoreError::DiscrepancyAlreadyResolved(id)));
    let (status, _) = post_request(ADMIN, "/discrepancies/4/resolve", r#"{"note":"done"}"#, configure(store)).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

fn configure(store: MockDiscrepancyStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(DiscrepanciesRoute::<MockDiscrepancyStore>::new())
            .service(DiscrepancyByIdRoute::<MockDiscrepancyStore>::new())
            .service(ResolveDiscrepancyRoute::<MockDiscrepancyStore>::new())
            .app_data(web::Data::new(DiscrepancyApi::new(store)));
    }
}

fn discrepancy(resolved: bool) -> Discrepancy {
    let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
    Discrepancy {
        id: 4,
        order_ref: "ord_7".into(),
        kind: DiscrepancyKind::DuplicateCapture,
        details: "Capture pay_2 arrived after pay_1 was committed".into(),
        fingerprint: String::new(),
        created_at,
        resolved,
        resolved_at: resolved.then_some(created_at),
        resolved_by: resolved.then(|| "admin:ops_1".to_string()),
        resolution_note: resolved.then(|| "Refunded the second capture".to_string()),
    }
}
