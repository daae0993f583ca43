//! Callbacks from the storefront, the payment gateway and the shipment provider.
//!
//! Apart from `/gateway/confirm`, which carries its own signature, every route here sits behind the HMAC middleware,
//! so by the time a handler runs the body is known to come from the caller that holds the shared secret.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use recon_engine::{
    db_types::{NewOrderIntent, OrderId},
    fulfillment_objects::ShipmentUpdate,
    order_objects::{PaymentEvent, TransitionOutcome},
    traits::{CatalogCache, Notifier, OrderFlowStore, ShipmentProvider, ShipmentStore},
    FulfillmentApi,
    OrderFlowApi,
    ReconciliationError,
};

use crate::{
    config::ServerOptions,
    data_objects::{CheckoutRequest, ClientConfirmation, JsonResponse},
    errors::ServerError,
    helpers::describe_caller,
    integrations::{gateway::payment_event_from_webhook, shipping::ShippingWebhook},
    route,
};

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout_intent => Post "/intents" impl OrderFlowStore, CatalogCache);
pub async fn checkout_intent<B: OrderFlowStore, C: CatalogCache>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let intent = NewOrderIntent::from(body.into_inner());
    debug!("🛒️ Checkout started for {} with {} line items", intent.external_ref, intent.cart.len());
    let intent = api.create_intent(intent).await?;
    Ok(HttpResponse::Ok().json(intent))
}

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(gateway_webhook => Post "/webhook" impl OrderFlowStore, CatalogCache);
pub async fn gateway_webhook<B: OrderFlowStore, C: CatalogCache>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💳️ Gateway webhook from {}", describe_caller(&req, **options));
    let event = payment_event_from_webhook(body.as_ref()).map_err(|e| {
        warn!("💳️ Could not read gateway webhook. {e}");
        ReconciliationError::InvalidEvent(e.to_string())
    })?;
    let Some(event) = event else {
        return Ok(HttpResponse::Ok().body("OK"));
    };
    let description = event.to_string();
    match api.apply(event).await {
        Ok(outcome) => {
            log_outcome(&description, &outcome);
            Ok(HttpResponse::Ok().body("OK"))
        },
        Err(e) => {
            warn!("💳️ {description} was rejected. {e}");
            Err(e.into())
        },
    }
}

route!(gateway_confirm => Post "/gateway/confirm" impl OrderFlowStore, CatalogCache);
pub async fn gateway_confirm<B: OrderFlowStore, C: CatalogCache>(
    body: web::Json<ClientConfirmation>,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let ClientConfirmation { order_id, payment_id, signature } = body.into_inner();
    let event = PaymentEvent::ClientConfirmed { order_ref: OrderId::from(order_id.trim()), payment_id, signature };
    let description = event.to_string();
    let outcome = api.apply(event).await?;
    log_outcome(&description, &outcome);
    let message = match outcome {
        TransitionOutcome::AlreadyApplied => "Payment already confirmed.",
        _ => "Payment confirmed.",
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

fn log_outcome(description: &str, outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::OrderPaid(order) => info!("💳️ {description}: order {} is paid", order.order_id),
        TransitionOutcome::PaymentFailed(intent) => info!("💳️ {description}: {} failed", intent.external_ref),
        TransitionOutcome::StatusChanged(order) => info!("💳️ {description}: order {} is {}", order.order_id, order.status),
        TransitionOutcome::AlreadyApplied => debug!("💳️ {description} had already been applied"),
    }
}

//----------------------------------------------   Shipping  ----------------------------------------------------
route!(shipping_webhook => Post "/webhook" impl ShipmentStore, ShipmentProvider, Notifier, CatalogCache);
pub async fn shipping_webhook<B, P, N, C>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<FulfillmentApi<B, P, N, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShipmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    trace!("🚚️ Shipping webhook from {}", describe_caller(&req, **options));
    let hook = serde_json::from_slice::<ShippingWebhook>(body.as_ref()).map_err(|e| {
        warn!("🚚️ Could not read shipping webhook. {e}");
        ReconciliationError::InvalidEvent(format!("Invalid tracking callback. {e}"))
    })?;
    let update = ShipmentUpdate::from(hook);
    let awb = update.awb_number.clone();
    let outcome = api.process_shipment_update(update).await?;
    if outcome.shipment.is_none() {
        // Orphans are acknowledged. The engine has already recorded a discrepancy for them.
        info!("🚚️ Tracking callback for unknown AWB {awb} was recorded for review");
    } else if !outcome.discrepancies.is_empty() {
        info!("🚚️ Tracking callback for {awb} raised {} discrepancies", outcome.discrepancies.len());
    }
    Ok(HttpResponse::Ok().json(outcome))
}
