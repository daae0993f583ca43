use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use recon_engine::{events::EventProducers, DiscrepancyApi, FulfillmentApi, OrderFlowApi, SqliteDatabase};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{
        cache::HttpCatalogCache,
        fulfillment::create_fulfillment_event_handlers,
        notifications::HttpNotifier,
        shipping::ShippingProvider,
    },
    middleware::HmacMiddlewareFactory,
    outbox_worker::start_outbox_worker,
    routes::{
        health,
        DiscrepanciesRoute,
        DiscrepancyByIdRoute,
        OrderDetailsRoute,
        ResolveDiscrepancyRoute,
        RetryShipmentRoute,
        ShipmentLabelRoute,
        ShipmentManifestRoute,
        UpdateOrderStatusRoute,
    },
    webhook_routes::{CheckoutIntentRoute, GatewayConfirmRoute, GatewayWebhookRoute, ShippingWebhookRoute},
};

pub const GATEWAY_SIGNATURE_HEADER: &str = "X-Gateway-Signature";
pub const CHECKOUT_SIGNATURE_HEADER: &str = "X-Checkout-Signature";
pub const SHIPPING_SIGNATURE_HEADER: &str = "X-Shipping-Signature";

pub type Fulfillment = FulfillmentApi<SqliteDatabase, ShippingProvider, HttpNotifier, HttpCatalogCache>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    info!("🗃️ Database at {} is ready", config.database_url);
    let provider =
        ShippingProvider::new(config.shipping.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let timeout = config.fulfillment.call_timeout;
    let notifier = HttpNotifier::new(config.notification_url.clone(), timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let cache = HttpCatalogCache::new(config.cache_invalidation_url.clone(), timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let fulfillment = FulfillmentApi::new(db.clone(), provider, notifier, cache.clone(), config.fulfillment.clone());
    let handlers = create_fulfillment_event_handlers(fulfillment.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _outbox = start_outbox_worker(fulfillment.clone(), config.outbox_interval, config.outbox_grace_period);
    let srv = create_server_instance(config, db, cache, fulfillment, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    cache: HttpCatalogCache,
    fulfillment: Fulfillment,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api =
            OrderFlowApi::new(db.clone(), cache.clone(), producers.clone(), config.confirmation_secret.clone())
                .with_call_timeout(config.fulfillment.call_timeout);
        let discrepancy_api = DiscrepancyApi::new(db.clone());
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("recon::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(fulfillment.clone()))
            .app_data(web::Data::new(discrepancy_api))
            .app_data(web::Data::new(options));
        // Dashboard routes. Each route checks the actor's role.
        let api_scope = web::scope("/api")
            .service(OrderDetailsRoute::<SqliteDatabase, HttpCatalogCache>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, HttpCatalogCache>::new())
            .service(RetryShipmentRoute::<SqliteDatabase, ShippingProvider, HttpNotifier, HttpCatalogCache>::new())
            .service(ShipmentLabelRoute::<SqliteDatabase, ShippingProvider, HttpNotifier, HttpCatalogCache>::new())
            .service(ShipmentManifestRoute::<SqliteDatabase, ShippingProvider, HttpNotifier, HttpCatalogCache>::new())
            .service(DiscrepanciesRoute::<SqliteDatabase>::new())
            .service(DiscrepancyByIdRoute::<SqliteDatabase>::new())
            .service(ResolveDiscrepancyRoute::<SqliteDatabase>::new());
        let checkout_scope = web::scope("/checkout")
            .wrap(HmacMiddlewareFactory::new(
                CHECKOUT_SIGNATURE_HEADER,
                config.checkout_secret.clone(),
                config.hmac_checks,
            ))
            .service(CheckoutIntentRoute::<SqliteDatabase, HttpCatalogCache>::new());
        let gateway_scope = web::scope("/gateway")
            .wrap(HmacMiddlewareFactory::new(
                GATEWAY_SIGNATURE_HEADER,
                config.gateway_webhook_secret.clone(),
                config.hmac_checks,
            ))
            .service(GatewayWebhookRoute::<SqliteDatabase, HttpCatalogCache>::new());
        let shipping_scope = web::scope("/shipping")
            .wrap(HmacMiddlewareFactory::new(
                SHIPPING_SIGNATURE_HEADER,
                config.shipping_webhook_secret.clone(),
                config.hmac_checks,
            ))
            .service(ShippingWebhookRoute::<SqliteDatabase, ShippingProvider, HttpNotifier, HttpCatalogCache>::new());
        app.service(health)
            // Must be registered before the /gateway scope, which would otherwise claim the path
            .service(GatewayConfirmRoute::<SqliteDatabase, HttpCatalogCache>::new())
            .service(checkout_scope)
            .service(gateway_scope)
            .service(shipping_scope)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies get the same `{"error": ...}` response as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into())
}
