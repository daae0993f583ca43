use std::future::Future;

use chrono::Duration;

use crate::{
    db_types::{
        DocumentKind,
        NewPurchaseRecord,
        NewShipment,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OutboxEntry,
        Shipment,
        ShipmentStatus,
    },
    traits::{
        data_objects::{ShipmentSlot, StatusChange},
        StoreError,
    },
};

/// Storage behaviour needed by the fulfillment coordinator.
///
/// Fulfillment runs on background tasks, so every future returned here must be `Send`.
pub trait FulfillmentStore: Clone + Send + Sync + 'static {
    /// Fetches a committed order along with its line items.
    fn fetch_order_with_items(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<(Order, Vec<OrderItem>)>, StoreError>> + Send;

    /// Claims the outbox entry for `(order_id, event_type)` for `lease`. A completed entry can never be claimed, and a
    /// claimed one can only be claimed again after its lease has run out.
    ///
    /// Returns `true` if this call claimed the entry.
    fn claim_outbox_entry(
        &self,
        order_id: &OrderId,
        event_type: &str,
        lease: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Marks the outbox entry as done. It will not be dispatched again.
    fn complete_outbox_entry(
        &self,
        order_id: &OrderId,
        event_type: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Outbox entries that need dispatching: unclaimed ones created more than `grace_period` ago, and claimed ones
    /// whose `lease` has expired without completion.
    fn fetch_pending_outbox_entries(
        &self,
        grace_period: Duration,
        lease: Duration,
    ) -> impl Future<Output = Result<Vec<OutboxEntry>, StoreError>> + Send;

    /// Inserts the purchase records, ignoring any that already exist. Returns the number of new records.
    fn record_purchases(&self, records: Vec<NewPurchaseRecord>)
        -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Reserves the shipment for an order. A previously failed shipment is recycled, as is a reservation that never
    /// reached the provider and was last touched more than `reclaim_after` ago. Any other live shipment is returned as
    /// [`ShipmentSlot::Existing`].
    fn reserve_shipment(
        &self,
        shipment: NewShipment,
        reclaim_after: Duration,
    ) -> impl Future<Output = Result<ShipmentSlot, StoreError>> + Send;

    fn mark_shipment_created(
        &self,
        shipment_id: i64,
        provider_shipment_id: &str,
        awb_number: Option<&str>,
    ) -> impl Future<Output = Result<Shipment, StoreError>> + Send;

    fn mark_shipment_failed(
        &self,
        shipment_id: i64,
        error: &str,
    ) -> impl Future<Output = Result<Shipment, StoreError>> + Send;

    fn fetch_shipment(&self, shipment_id: i64) -> impl Future<Output = Result<Option<Shipment>, StoreError>> + Send;

    fn fetch_shipment_by_awb(&self, awb: &str) -> impl Future<Output = Result<Option<Shipment>, StoreError>> + Send;

    fn update_shipment_status(
        &self,
        shipment_id: i64,
        status: ShipmentStatus,
    ) -> impl Future<Output = Result<Shipment, StoreError>> + Send;

    fn set_document_url(
        &self,
        shipment_id: i64,
        kind: DocumentKind,
        url: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The same conditional update as [`crate::traits::OrderStore::update_order_status`], for automated transitions
    /// driven by shipment progress.
    fn advance_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        actor: &str,
        reason: &str,
    ) -> impl Future<Output = Result<StatusChange, StoreError>> + Send;
}
