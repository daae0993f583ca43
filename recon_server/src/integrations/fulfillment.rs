use log::*;
use recon_engine::{
    events::{EventHandlers, EventHooks},
    traits::{CatalogCache, FulfillmentStore, Notifier, ShipmentProvider},
    FulfillmentApi,
};

pub const FULFILLMENT_EVENT_BUFFER_SIZE: usize = 64;

/// Subscribes the fulfillment coordinator to the payment state machine's events.
///
/// 1. OrderPaidEvent - Purchase records, shipment creation and the order confirmation and new-sale notifications. Each
///    step runs independently, and a failure in one is logged without affecting the others or the committed order.
/// 2. OrderStatusChangedEvent - The buyer is told their order moved.
///
/// Hand the handlers' producers to the `OrderFlowApi`, then start the handlers.
pub fn create_fulfillment_event_handlers<B, P, N, C>(api: FulfillmentApi<B, P, N, C>) -> EventHandlers
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    let mut hooks = EventHooks::default();
    let api_clone = api.clone();
    // --- On OrderPaid Handler ---
    hooks.on_order_paid(move |ev| {
        let api = api_clone.clone();
        Box::pin(async move {
            let order_id = ev.order.order_id.clone();
            match api.on_order_paid(ev.order, ev.items).await {
                Some(report) if report.is_complete() => debug!("📦️ {report}"),
                Some(report) => warn!("📦️ Fulfillment for {order_id} needs attention. {report}"),
                None => trace!("📦️ Fulfillment for {order_id} was already dispatched"),
            }
        })
    });
    // --- On StatusChanged Handler ---
    hooks.on_status_changed(move |ev| {
        let api = api.clone();
        Box::pin(async move {
            api.notify_status_change(ev).await;
        })
    });
    EventHandlers::new(FULFILLMENT_EVENT_BUFFER_SIZE, hooks)
}
