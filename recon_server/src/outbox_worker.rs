use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;
use recon_engine::{
    traits::{CatalogCache, FulfillmentStore, Notifier, ShipmentProvider},
    FulfillmentApi,
};
use tokio::task::JoinHandle;

/// Starts the outbox worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, paid orders whose fulfillment has not been claimed within `grace_period` of the payment are
/// dispatched again. This covers a crash between committing a payment and handing it to the fulfillment coordinator.
pub fn start_outbox_worker<B, P, N, C>(
    api: FulfillmentApi<B, P, N, C>,
    interval: StdDuration,
    grace_period: Duration,
) -> JoinHandle<()>
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Outbox worker started. Grace period: {}s", grace_period.num_seconds());
        loop {
            timer.tick().await;
            trace!("🕰️ Running outbox sweep");
            match api.dispatch_stale_events(grace_period).await {
                Ok(0) => trace!("🕰️ No stale fulfillment events"),
                Ok(n) => info!("🕰️ {n} paid orders were re-dispatched for fulfillment"),
                Err(e) => error!("🕰️ Error running outbox sweep: {e}"),
            }
        }
    })
}
