//! A throwaway SQLite database wired to fake collaborators, with the routes mounted the way the server mounts them.
use actix_web::{web, web::ServiceConfig};
use recon_common::Secret;
use recon_engine::{
    db_types::{CartItem, NewOrderIntent, Order, OrderId, Paise, Shipment},
    events::EventProducers,
    fulfillment_objects::FulfillmentConfig,
    order_objects::{PaymentEvent, TransitionOutcome},
    test_utils::{
        fakes::{FakeShipmentProvider, RecordingCache, RecordingNotifier},
        prepare_env::{drop_database, prepare_test_env, random_db_path},
    },
    traits::OrderStore,
    DiscrepancyApi,
    FulfillmentApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerOptions,
    middleware::HmacMiddlewareFactory,
    routes::{
        DiscrepanciesRoute,
        OrderDetailsRoute,
        RetryShipmentRoute,
        ShipmentLabelRoute,
        ShipmentManifestRoute,
        UpdateOrderStatusRoute,
    },
    server::{CHECKOUT_SIGNATURE_HEADER, GATEWAY_SIGNATURE_HEADER, SHIPPING_SIGNATURE_HEADER},
    webhook_routes::{CheckoutIntentRoute, GatewayConfirmRoute, GatewayWebhookRoute, ShippingWebhookRoute},
};

pub const GATEWAY_SECRET: &str = "gateway-webhook-secret";
pub const CHECKOUT_SECRET: &str = "storefront-checkout-secret";
pub const SHIPPING_SECRET: &str = "shipping-webhook-secret";
pub const CONFIRMATION_SECRET: &str = "gateway-key-secret";

type Fulfillment = FulfillmentApi<SqliteDatabase, FakeShipmentProvider, RecordingNotifier, RecordingCache>;

pub struct TestSystem {
    db_path: String,
    pub db: SqliteDatabase,
    pub fulfillment: Fulfillment,
    pub provider: FakeShipmentProvider,
    pub cache: RecordingCache,
}

impl TestSystem {
    /// Payment events are not dispatched to fulfillment. Tests that need a shipment call [`Self::ship`].
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        let provider = FakeShipmentProvider::new();
        let cache = RecordingCache::new();
        let notifier = RecordingNotifier::new();
        let fulfillment =
            FulfillmentApi::new(db.clone(), provider.clone(), notifier, cache.clone(), FulfillmentConfig::default());
        Self { db_path, db, fulfillment, provider, cache }
    }

    pub fn flow(&self) -> OrderFlowApi<SqliteDatabase, RecordingCache> {
        let secret = Secret::new(CONFIRMATION_SECRET.to_string());
        OrderFlowApi::new(self.db.clone(), self.cache.clone(), EventProducers::default(), secret)
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let flow = self.flow();
        let fulfillment = self.fulfillment.clone();
        let discrepancies = DiscrepancyApi::new(self.db.clone());
        move |cfg| {
            let api_scope = web::scope("/api")
                .service(OrderDetailsRoute::<SqliteDatabase, RecordingCache>::new())
                .service(UpdateOrderStatusRoute::<SqliteDatabase, RecordingCache>::new())
                .service(
                    RetryShipmentRoute::<SqliteDatabase, FakeShipmentProvider, RecordingNotifier, RecordingCache>::new(),
                )
                .service(
                    ShipmentLabelRoute::<SqliteDatabase, FakeShipmentProvider, RecordingNotifier, RecordingCache>::new(),
                )
                .service(ShipmentManifestRoute::<
                    SqliteDatabase,
                    FakeShipmentProvider,
                    RecordingNotifier,
                    RecordingCache,
                >::new())
                .service(DiscrepanciesRoute::<SqliteDatabase>::new());
            let checkout_scope = web::scope("/checkout")
                .wrap(HmacMiddlewareFactory::new(CHECKOUT_SIGNATURE_HEADER, secret(CHECKOUT_SECRET), true))
                .service(CheckoutIntentRoute::<SqliteDatabase, RecordingCache>::new());
            let gateway_scope = web::scope("/gateway")
                .wrap(HmacMiddlewareFactory::new(GATEWAY_SIGNATURE_HEADER, secret(GATEWAY_SECRET), true))
                .service(GatewayWebhookRoute::<SqliteDatabase, RecordingCache>::new());
            let shipping_scope = web::scope("/shipping")
                .wrap(HmacMiddlewareFactory::new(SHIPPING_SIGNATURE_HEADER, secret(SHIPPING_SECRET), true))
                .service(ShippingWebhookRoute::<
                    SqliteDatabase,
                    FakeShipmentProvider,
                    RecordingNotifier,
                    RecordingCache,
                >::new());
            cfg.app_data(web::Data::new(flow))
                .app_data(web::Data::new(fulfillment))
                .app_data(web::Data::new(discrepancies))
                .app_data(web::Data::new(ServerOptions::default()))
                .service(GatewayConfirmRoute::<SqliteDatabase, RecordingCache>::new())
                .service(checkout_scope)
                .service(gateway_scope)
                .service(shipping_scope)
                .service(api_scope);
        }
    }

    /// Creates a pending checkout with items from `brand_a` and `brand_b`.
    pub async fn checkout(&self, order_ref: &str) {
        let intent = NewOrderIntent::new(OrderId::from(order_ref), Some("user_42".into()), sample_cart());
        self.flow().create_intent(intent).await.expect("Error creating intent");
    }

    pub async fn paid_order(&self, order_ref: &str) -> Order {
        self.checkout(order_ref).await;
        let event = PaymentEvent::PaymentCaptured {
            order_ref: OrderId::from(order_ref),
            payment_id: format!("pay_{order_ref}"),
            method: Some("upi".into()),
        };
        match self.flow().apply(event).await.expect("Error capturing payment") {
            TransitionOutcome::OrderPaid(order) => order,
            other => panic!("Expected the order to be paid, got {other:?}"),
        }
    }

    /// Runs fulfillment for a paid order and returns the shipment it created.
    pub async fn ship(&self, order: Order) -> Shipment {
        let items = self.db.fetch_order_items(&order.order_id).await.expect("Error fetching items");
        let order_id = order.order_id.clone();
        let _ = self.fulfillment.on_order_paid(order, items).await;
        let shipments = self.db.fetch_shipments_for_order(&order_id).await.expect("Error fetching shipments");
        shipments.into_iter().next().expect("No shipment was created")
    }

    pub async fn tear_down(self) {
        self.db.pool().close().await;
        drop_database(&self.db_path).await;
    }
}

fn secret(s: &str) -> Secret<String> {
    Secret::new(s.to_string())
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
