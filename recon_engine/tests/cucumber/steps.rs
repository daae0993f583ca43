use std::{str::FromStr, time::Duration};

use cucumber::{given, then, when};
use recon_engine::{
    db_types::{Actor, DiscrepancyKind, OrderId, OrderStatusType, PaymentStatus, ShipmentStatus},
    fulfillment_objects::ShipmentUpdate,
    order_objects::{PaymentEvent, TransitionOutcome},
    traits::{DiscrepancyFilter, OrderStore, Pagination},
    ReconciliationError,
};

use crate::{
    cucumber::ReconWorld,
    support::{captured, client_confirmed, failed, wait_for_fulfillment},
};

#[given(expr = "a checkout for order {word}")]
async fn checkout(world: &mut ReconWorld, order_ref: String) {
    world.system().checkout(&order_ref).await;
}

#[given("the shipment provider is down")]
async fn provider_down(world: &mut ReconWorld) {
    world.system().provider.set_fail_on_create(true);
}

#[given("the shipment provider is back up")]
async fn provider_up(world: &mut ReconWorld) {
    world.system().provider.set_fail_on_create(false);
}

#[given(expr = "the shipment provider returns documents starting with {string}")]
async fn provider_document(world: &mut ReconWorld, content: String) {
    world.system().provider.set_document(content.as_bytes(), None);
}

#[when(expr = "the gateway captures payment {word} for order {word} by {word}")]
async fn gateway_capture(world: &mut ReconWorld, payment_id: String, order_ref: String, method: String) {
    let result = world.system().flow.apply(captured(&order_ref, &payment_id, &method)).await;
    world.last_result = Some(result);
}

#[when(expr = "the gateway reports payment {word} for order {word} as failed")]
async fn gateway_failure(world: &mut ReconWorld, payment_id: String, order_ref: String) {
    let result = world.system().flow.apply(failed(&order_ref, &payment_id)).await;
    world.last_result = Some(result);
}

#[when(expr = "the buyer confirms payment {word} for order {word}")]
async fn buyer_confirms(world: &mut ReconWorld, payment_id: String, order_ref: String) {
    let result = world.system().flow.apply(client_confirmed(&order_ref, &payment_id)).await;
    world.last_result = Some(result);
}

#[when(expr = "the buyer confirms payment {word} for order {word} with signature {word}")]
async fn buyer_confirms_with_signature(world: &mut ReconWorld, payment_id: String, order_ref: String, sig: String) {
    let event = PaymentEvent::ClientConfirmed { order_ref: OrderId::from(order_ref), payment_id, signature: sig };
    let result = world.system().flow.apply(event).await;
    world.last_result = Some(result);
}

#[when(expr = "admin {word} sets order {word} to {word}")]
async fn admin_override(world: &mut ReconWorld, admin: String, order_ref: String, status: String) {
    let new_status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let event = PaymentEvent::ManualStatusOverride {
        order_id: OrderId::from(order_ref),
        new_status,
        actor: Actor::admin(admin),
        reason: None,
    };
    let result = world.system().flow.apply(event).await;
    world.last_result = Some(result);
}

#[when(expr = "fulfillment for order {word} has settled")]
async fn fulfillment_settled(world: &mut ReconWorld, order_ref: String) {
    wait_for_fulfillment(world.system(), &order_ref).await;
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut ReconWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[when(expr = "an operator retries the shipment for order {word}")]
async fn retry_shipment(world: &mut ReconWorld, order_ref: String) {
    world.system().fulfillment.retry_shipment(&OrderId::from(order_ref)).await.expect("Shipment retry failed");
}

#[when(expr = "an operator requests the label for order {word}")]
async fn request_label(world: &mut ReconWorld, order_ref: String) {
    let system = world.system();
    let shipments = system.db.fetch_shipments_for_order(&OrderId::from(order_ref)).await.unwrap();
    let shipment = shipments.first().expect("The order has no shipment");
    let result = system.fulfillment.generate_label(shipment.id).await;
    world.last_document = Some(result);
}

#[when(expr = "the courier reports AWB {word} as {string}")]
async fn courier_update(world: &mut ReconWorld, awb: String, status: String) {
    let update = ShipmentUpdate { awb_number: awb, status, weight_grams: None, dimensions: None };
    world.system().fulfillment.process_shipment_update(update).await.expect("Shipment update failed");
}

#[then("the event is accepted")]
async fn event_accepted(world: &mut ReconWorld) {
    let result = world.last_result.as_ref().expect("No event has been applied");
    assert!(result.is_ok(), "Event was rejected: {result:?}");
}

#[then("the event is a no-op")]
async fn event_no_op(world: &mut ReconWorld) {
    let result = world.last_result.as_ref().expect("No event has been applied");
    assert!(matches!(result, Ok(TransitionOutcome::AlreadyApplied)), "Expected a no-op, got {result:?}");
}

#[then("the event is rejected as a conflict")]
async fn event_conflict(world: &mut ReconWorld) {
    let err = world.last_error();
    assert!(matches!(err, ReconciliationError::ConflictingStateTransition { .. }), "Unexpected error: {err}");
}

#[then("the event is rejected as a failed precondition")]
async fn event_precondition(world: &mut ReconWorld) {
    let err = world.last_error();
    assert!(matches!(err, ReconciliationError::PreconditionFailed(_)), "Unexpected error: {err}");
}

#[then("the event is rejected as a forbidden transition")]
async fn event_forbidden(world: &mut ReconWorld) {
    let err = world.last_error();
    assert!(matches!(err, ReconciliationError::ForbiddenTransition { .. }), "Unexpected error: {err}");
}

#[then("the event is rejected for an invalid signature")]
async fn event_bad_signature(world: &mut ReconWorld) {
    let err = world.last_error();
    assert!(matches!(err, ReconciliationError::SignatureInvalid), "Unexpected error: {err}");
}

#[then("the event is rejected for an unknown order")]
async fn event_unknown_order(world: &mut ReconWorld) {
    let err = world.last_error();
    assert!(matches!(err, ReconciliationError::OrderNotFound(_)), "Unexpected error: {err}");
}

#[then(expr = "order {word} has payment status {word}")]
async fn check_payment_status(world: &mut ReconWorld, order_ref: String, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Not a valid payment status");
    let intent = world.system().db.fetch_intent(&OrderId::from(order_ref)).await.unwrap().expect("No such intent");
    assert_eq!(intent.payment_status, expected);
}

#[then(expr = "order {word} is {word} and paid by {word} with {word}")]
async fn check_paid_order(world: &mut ReconWorld, order_ref: String, status: String, payment_id: String, method: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.system().db.fetch_order(&OrderId::from(order_ref)).await.unwrap().expect("No such order");
    assert_eq!(order.status, expected);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_id, Some(payment_id));
    assert_eq!(order.payment_method, Some(method));
}

#[then(expr = "order {word} has status {word}")]
async fn check_order_status(world: &mut ReconWorld, order_ref: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.system().db.fetch_order(&OrderId::from(order_ref)).await.unwrap().expect("No such order");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} does not exist")]
async fn check_no_order(world: &mut ReconWorld, order_ref: String) {
    let order = world.system().db.fetch_order(&OrderId::from(order_ref)).await.unwrap();
    assert!(order.is_none(), "Order exists: {order:?}");
}

#[then(expr = "the shipment provider was called {int} time(s)")]
async fn check_provider_calls(world: &mut ReconWorld, n: usize) {
    assert_eq!(world.system().provider.create_calls(), n);
}

#[then(expr = "order {word} has {int} shipment(s) with status {word}")]
async fn check_shipments(world: &mut ReconWorld, order_ref: String, n: usize, status: String) {
    let shipments = world.system().db.fetch_shipments_for_order(&OrderId::from(order_ref)).await.unwrap();
    assert_eq!(shipments.len(), n);
    let expected = status.parse::<ShipmentStatus>().expect("Not a valid shipment status");
    assert!(shipments.iter().all(|s| s.status == expected), "Shipments: {shipments:?}");
}

#[then(expr = "order {word} has {int} purchase record(s)")]
async fn check_purchases(world: &mut ReconWorld, order_ref: String, n: i64) {
    let count = world.system().db.count_purchase_records(&OrderId::from(order_ref)).await.unwrap();
    assert_eq!(count, n);
}

#[then(expr = "{int} notification(s) were sent")]
async fn check_notifications(world: &mut ReconWorld, n: usize) {
    assert_eq!(world.system().notifier.sent().len(), n);
}

#[then(expr = "{int} discrepancy/discrepancies of kind {word} exist(s) for {word}")]
async fn check_discrepancies(world: &mut ReconWorld, n: i64, kind: String, order_ref: String) {
    let kind = kind.parse::<DiscrepancyKind>().expect("Not a valid discrepancy kind");
    let page = world
        .system()
        .discrepancies
        .search(DiscrepancyFilter::default().with_search(order_ref.clone()), Pagination::default())
        .await
        .unwrap();
    let matching = page.items.iter().filter(|d| d.kind == kind && d.order_ref == order_ref).count() as i64;
    assert_eq!(matching, n, "Discrepancies: {:?}", page.items);
}

#[then("no discrepancies exist")]
async fn check_no_discrepancies(world: &mut ReconWorld) {
    let page =
        world.system().discrepancies.search(DiscrepancyFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0, "Discrepancies: {:?}", page.items);
}

#[then("the label is rejected as an invalid document")]
async fn label_rejected(world: &mut ReconWorld) {
    let result = world.last_document.as_ref().expect("No label was requested");
    assert!(matches!(result, Err(ReconciliationError::InvalidDocument(_))), "Unexpected result: {result:?}");
}

#[then("the label is a PDF")]
async fn label_accepted(world: &mut ReconWorld) {
    let result = world.last_document.as_ref().expect("No label was requested");
    match result {
        Ok(doc) => assert!(doc.starts_with(b"%PDF")),
        Err(e) => panic!("Label was rejected: {e}"),
    }
}
