#![allow(dead_code)]
//! A fully wired reconciliation system backed by a throwaway SQLite database, shared by the integration tests.
use std::{future::Future, sync::Arc, time::Duration};

use log::*;
use recon_common::Secret;
use recon_engine::{
    db_types::{CartItem, NewOrderIntent, OrderId, OrderIntent, Paise},
    events::{EventHandlers, EventHooks},
    fulfillment_objects::FulfillmentConfig,
    helpers::signature::sign_client_confirmation,
    order_objects::PaymentEvent,
    test_utils::{
        fakes::{FakeShipmentProvider, RecordingCache, RecordingNotifier},
        prepare_env::{drop_database, prepare_test_env, random_db_path},
    },
    DiscrepancyApi,
    FulfillmentApi,
    OrderFlowApi,
    SqliteDatabase,
};

pub const CONFIRMATION_SECRET: &str = "checkout-confirmation-secret";

pub type Flow = OrderFlowApi<SqliteDatabase, RecordingCache>;
pub type Fulfillment = FulfillmentApi<SqliteDatabase, FakeShipmentProvider, RecordingNotifier, RecordingCache>;

pub struct ReconSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub flow: Arc<Flow>,
    pub fulfillment: Fulfillment,
    pub discrepancies: DiscrepancyApi<SqliteDatabase>,
    pub provider: FakeShipmentProvider,
    pub notifier: RecordingNotifier,
    pub cache: RecordingCache,
}

impl std::fmt::Debug for ReconSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconSystem({})", self.db_path)
    }
}

impl ReconSystem {
    /// A system whose order-paid events are handed to the fulfillment coordinator, as the server wires it.
    pub async fn new() -> Self {
        Self::with_config(FulfillmentConfig::default(), true).await
    }

    /// A system that commits payments but never dispatches fulfillment, as if the process died after the commit.
    pub async fn without_dispatch() -> Self {
        Self::with_config(FulfillmentConfig::default(), false).await
    }

    pub async fn with_config(config: FulfillmentConfig, dispatch: bool) -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        let provider = FakeShipmentProvider::new();
        let notifier = RecordingNotifier::new();
        let cache = RecordingCache::new();
        let fulfillment = FulfillmentApi::new(db.clone(), provider.clone(), notifier.clone(), cache.clone(), config);
        let mut hooks = EventHooks::default();
        if dispatch {
            let f1 = fulfillment.clone();
            hooks.on_order_paid(move |ev| {
                let f = f1.clone();
                Box::pin(async move {
                    let _ = f.on_order_paid(ev.order, ev.items).await;
                })
            });
            let f2 = fulfillment.clone();
            hooks.on_status_changed(move |ev| {
                let f = f2.clone();
                Box::pin(async move {
                    f.notify_status_change(ev).await;
                })
            });
        }
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let secret = Secret::new(CONFIRMATION_SECRET.to_string());
        let flow = Arc::new(OrderFlowApi::new(db.clone(), cache.clone(), producers, secret));
        let discrepancies = DiscrepancyApi::new(db.clone());
        Self { db_path, db, flow, fulfillment, discrepancies, provider, notifier, cache }
    }

    pub async fn tear_down(self) {
        self.db.pool().close().await;
        drop_database(&self.db_path).await;
    }

    /// Creates a checkout for `order_ref` with two line items from two brands.
    pub async fn checkout(&self, order_ref: &str) -> OrderIntent {
        let intent = NewOrderIntent::new(OrderId::from(order_ref), Some("user_42".into()), sample_cart());
        self.flow.create_intent(intent).await.expect("Error creating intent")
    }
}

pub fn sample_cart() -> Vec<CartItem> {
    vec![
        CartItem {
            product_id: "prod_kurta".into(),
            variant_id: Some("size_m".into()),
            brand_id: "brand_a".into(),
            quantity: 2,
            unit_price: Paise::from_rupees(1_200),
            weight_grams: Some(400),
        },
        CartItem {
            product_id: "prod_scarf".into(),
            variant_id: None,
            brand_id: "brand_b".into(),
            quantity: 1,
            unit_price: Paise::from_rupees(650),
            weight_grams: None,
        },
    ]
}

pub fn captured(order_ref: &str, payment_id: &str, method: &str) -> PaymentEvent {
    PaymentEvent::PaymentCaptured {
        order_ref: OrderId::from(order_ref),
        payment_id: payment_id.into(),
        method: Some(method.into()),
    }
}

pub fn failed(order_ref: &str, payment_id: &str) -> PaymentEvent {
    PaymentEvent::PaymentFailed { order_ref: OrderId::from(order_ref), payment_id: payment_id.into(), method: None }
}

pub fn client_confirmed(order_ref: &str, payment_id: &str) -> PaymentEvent {
    let signature = sign_client_confirmation(order_ref, payment_id, CONFIRMATION_SECRET);
    PaymentEvent::ClientConfirmed { order_ref: OrderId::from(order_ref), payment_id: payment_id.into(), signature }
}

/// Polls `check` until it returns true, or panics after two seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    error!("🚀️ Timed out waiting for {what}");
    panic!("Timed out waiting for {what}");
}

/// Waits until background fulfillment has called the shipment provider at least `n` times.
pub async fn wait_for_shipments(system: &ReconSystem, n: usize) {
    let provider = system.provider.clone();
    eventually("shipment creation", move || {
        let provider = provider.clone();
        async move { provider.create_calls() >= n }
    })
    .await;
    // Give any duplicate dispatch a chance to show up before the caller asserts on exact counts
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Waits until background fulfillment for `order_ref` has settled: the shipment left `Requested`, and the purchase
/// records and notifications are in.
pub async fn wait_for_fulfillment(system: &ReconSystem, order_ref: &str) {
    use recon_engine::{db_types::ShipmentStatus, traits::OrderStore};
    let order_id = OrderId::from(order_ref);
    let db = system.db.clone();
    let notifier = system.notifier.clone();
    eventually("fulfillment to settle", move || {
        let db = db.clone();
        let notifier = notifier.clone();
        let order_id = order_id.clone();
        async move {
            let shipments = db.fetch_shipments_for_order(&order_id).await.expect("Error fetching shipments");
            let shipped = !shipments.is_empty() && shipments.iter().all(|s| s.status != ShipmentStatus::Requested);
            let purchases = db.count_purchase_records(&order_id).await.expect("Error counting purchases");
            let notified = notifier.sent().iter().any(|n| n.order_id == order_id);
            shipped && purchases > 0 && notified
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
}
