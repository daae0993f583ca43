use std::{collections::BTreeSet, fmt::Debug, future::Future};

use futures_util::future::join_all;
use log::*;

use crate::{
    db_types::{
        Dimensions,
        Discrepancy,
        DiscrepancyKind,
        DocumentKind,
        NewDiscrepancy,
        NewPurchaseRecord,
        NewShipment,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentStatus,
        Shipment,
        ShipmentStatus,
        ORDER_PAID_EVENT,
    },
    events::OrderStatusChangedEvent,
    helpers::validate_pdf,
    recon_api::{
        errors::ReconciliationError,
        fulfillment_objects::{
            FulfillmentConfig,
            FulfillmentReport,
            ShipmentCreation,
            ShipmentUpdate,
            ShipmentUpdateOutcome,
            StepResult,
        },
    },
    traits::{
        cache_keys_for_order,
        CatalogCache,
        DiscrepancyManagement,
        DownstreamError,
        FulfillmentStore,
        Notification,
        NotificationKind,
        Notifier,
        Recipient,
        ShipmentProvider,
        ShipmentRequest,
        ShipmentSlot,
        StatusChange,
    },
};

const SHIPPING_ACTOR: &str = "shipping_provider";

/// `FulfillmentApi` coordinates everything that happens after an order is paid: analytics records, shipment creation
/// and notifications. It also handles the operator-triggered shipment operations and provider tracking callbacks.
///
/// Post-payment side effects are failure-isolated. A failing step is logged and reported, and never affects the
/// committed order state or the other steps.
#[derive(Clone)]
pub struct FulfillmentApi<B, P, N, C> {
    db: B,
    provider: P,
    notifier: N,
    cache: C,
    config: FulfillmentConfig,
}

impl<B, P, N, C> Debug for FulfillmentApi<B, P, N, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi")
    }
}

impl<B, P, N, C> FulfillmentApi<B, P, N, C> {
    pub fn new(db: B, provider: P, notifier: N, cache: C, config: FulfillmentConfig) -> Self {
        Self { db, provider, notifier, cache, config }
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }
}

impl<B, P, N, C> FulfillmentApi<B, P, N, C>
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    /// Runs the post-payment side effects for a freshly paid order.
    ///
    /// The order's outbox entry is claimed first, and marked complete once every step has run. Returns `None` if the
    /// entry is complete or another caller holds an unexpired claim on it. A caller that dies mid-way leaves the entry
    /// to be picked up again by [`Self::dispatch_stale_events`] after the lease runs out; every step is safe to repeat.
    pub async fn on_order_paid(&self, order: Order, items: Vec<OrderItem>) -> Option<FulfillmentReport> {
        match self.db.claim_outbox_entry(&order.order_id, ORDER_PAID_EVENT, self.config.outbox_lease).await {
            Ok(true) => {},
            Ok(false) => {
                debug!("📦️ Fulfillment for {} has already been dispatched", order.order_id);
                return None;
            },
            Err(e) => {
                error!("📦️ Could not claim fulfillment for {}. It will be retried by the outbox worker. {e}", order.order_id);
                return None;
            },
        }
        let (purchases, shipment, notifications) = tokio::join!(
            self.record_purchases(&order, &items),
            self.shipment_step(&order, &items),
            self.notify_order_paid(&order, &items),
        );
        let report = FulfillmentReport { order_id: order.order_id.clone(), purchases, shipment, notifications };
        if report.is_complete() {
            info!("📦️ Fulfillment dispatched. {report}");
        } else {
            warn!("📦️ Fulfillment finished with failures. {report}");
        }
        if let Err(e) = self.db.complete_outbox_entry(&order.order_id, ORDER_PAID_EVENT).await {
            warn!("📦️ Could not mark fulfillment for {} as done. It will be dispatched again. {e}", order.order_id);
        }
        Some(report)
    }

    /// Re-dispatches paid orders whose outbox entries are still unclaimed after `grace_period`, or whose claim expired
    /// before fulfillment finished. This recovers from a crash between committing a payment and dispatching its side
    /// effects, and from a crash part way through them.
    ///
    /// Returns the number of orders that were dispatched.
    pub async fn dispatch_stale_events(&self, grace_period: chrono::Duration) -> Result<usize, ReconciliationError> {
        let entries = self.db.fetch_pending_outbox_entries(grace_period, self.config.outbox_lease).await?;
        let mut dispatched = 0;
        for entry in entries {
            if entry.event_type != ORDER_PAID_EVENT {
                warn!("📦️ Outbox entry #{} has unknown event type {}", entry.id, entry.event_type);
                continue;
            }
            match self.db.fetch_order_with_items(&entry.order_id).await? {
                Some((order, items)) => {
                    info!("📦️ Re-dispatching fulfillment for {} from the outbox", order.order_id);
                    if self.on_order_paid(order, items).await.is_some() {
                        dispatched += 1;
                    }
                },
                None => error!("📦️ Outbox entry #{} refers to missing order {}", entry.id, entry.order_id),
            }
        }
        Ok(dispatched)
    }

    /// Operator-triggered retry of shipment creation for a paid order. If the order already has a shipment accepted by
    /// the provider, that shipment is returned and the provider is not called. A reservation that never got a provider
    /// id is taken over straight away.
    pub async fn retry_shipment(&self, order_id: &OrderId) -> Result<Shipment, ReconciliationError> {
        let (order, items) = self
            .db
            .fetch_order_with_items(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
        if order.payment_status != PaymentStatus::Paid {
            return Err(ReconciliationError::PreconditionFailed(format!("Order {order_id} has not been paid")));
        }
        if order.status == OrderStatusType::Cancelled {
            return Err(ReconciliationError::PreconditionFailed(format!("Order {order_id} has been cancelled")));
        }
        match self.create_shipment(&order, &items, chrono::Duration::zero()).await? {
            ShipmentCreation::Created(s) | ShipmentCreation::AlreadyExists(s) => Ok(s),
            ShipmentCreation::Failed(_, e) => Err(ReconciliationError::DownstreamUnavailable(e)),
        }
    }

    pub async fn generate_label(&self, shipment_id: i64) -> Result<Vec<u8>, ReconciliationError> {
        self.generate_document(shipment_id, DocumentKind::Label).await
    }

    pub async fn generate_manifest(&self, shipment_id: i64) -> Result<Vec<u8>, ReconciliationError> {
        self.generate_document(shipment_id, DocumentKind::Manifest).await
    }

    /// Notifies the buyer of a committed status change.
    pub async fn notify_status_change(&self, event: OrderStatusChangedEvent) {
        let order = &event.order;
        let note = Notification::new(
            Recipient::Buyer(order.user_id.clone()),
            order.order_id.clone(),
            NotificationKind::StatusChanged(order.status),
        );
        if let Err(e) = self.bounded(self.notifier.notify(note)).await {
            warn!("📦️ Could not notify the buyer that {} is now {}. {e}", order.order_id, order.status);
        }
    }

    async fn generate_document(&self, shipment_id: i64, kind: DocumentKind) -> Result<Vec<u8>, ReconciliationError> {
        let shipment =
            self.db.fetch_shipment(shipment_id).await?.ok_or(ReconciliationError::ShipmentNotFound(shipment_id))?;
        let provider_id = shipment.provider_shipment_id.as_deref().ok_or_else(|| {
            ReconciliationError::PreconditionFailed(format!(
                "Shipment #{shipment_id} has not been accepted by the provider yet"
            ))
        })?;
        let doc = match kind {
            DocumentKind::Label => self.bounded(self.provider.generate_label(provider_id)).await,
            DocumentKind::Manifest => self.bounded(self.provider.generate_manifest(provider_id)).await,
        }
        .map_err(|e| {
            warn!("📦️ Could not generate the {kind} for shipment #{shipment_id}. {e}");
            ReconciliationError::from(e)
        })?;
        if let Err(e) = validate_pdf(&doc.content) {
            warn!("📦️ The provider returned an invalid {kind} for shipment #{shipment_id}. {e}");
            return Err(e.into());
        }
        if let Some(url) = &doc.url {
            if let Err(e) = self.db.set_document_url(shipment_id, kind, url).await {
                warn!("📦️ Could not save the {kind} URL for shipment #{shipment_id}. {e}");
            }
        }
        debug!("📦️ Generated {kind} for shipment #{shipment_id} ({} bytes)", doc.content.len());
        Ok(doc.content)
    }

    async fn record_purchases(&self, order: &Order, items: &[OrderItem]) -> StepResult {
        let records =
            items.iter().map(|item| NewPurchaseRecord::from_item(item, order.user_id.as_deref())).collect::<Vec<_>>();
        let expected = records.len();
        match self.db.record_purchases(records).await {
            Ok(n) if n as usize == expected => StepResult::Completed,
            Ok(n) => {
                debug!("📦️ {} of {expected} purchase records for {} already existed", expected - n as usize, order.order_id);
                StepResult::Completed
            },
            Err(e) => {
                error!("📦️ Could not record purchases for {}. {e}", order.order_id);
                StepResult::Failed(e.to_string())
            },
        }
    }

    async fn shipment_step(&self, order: &Order, items: &[OrderItem]) -> StepResult {
        match self.create_shipment(order, items, self.config.stale_reservation).await {
            Ok(ShipmentCreation::Created(_)) => StepResult::Completed,
            Ok(ShipmentCreation::AlreadyExists(s)) => StepResult::Skipped(format!("shipment #{} exists", s.id)),
            Ok(ShipmentCreation::Failed(_, e)) => StepResult::Failed(e),
            Err(e) => {
                error!("📦️ Could not create the shipment for {}. {e}", order.order_id);
                StepResult::Failed(e.to_string())
            },
        }
    }

    /// Reserves the shipment row and calls the provider. Provider failures are persisted on the shipment rather than
    /// returned as errors; only storage failures are errors.
    async fn create_shipment(
        &self,
        order: &Order,
        items: &[OrderItem],
        reclaim_after: chrono::Duration,
    ) -> Result<ShipmentCreation, ReconciliationError> {
        let weight_grams = self.declared_weight(items);
        let dimensions = self.config.default_package;
        let new_shipment =
            NewShipment { order_id: order.order_id.clone(), weight_grams: Some(weight_grams), dimensions: Some(dimensions) };
        let shipment = match self.db.reserve_shipment(new_shipment, reclaim_after).await? {
            ShipmentSlot::Reserved(s) => s,
            ShipmentSlot::Existing(s) => {
                debug!("📦️ Order {} already has shipment #{} ({})", order.order_id, s.id, s.status);
                return Ok(ShipmentCreation::AlreadyExists(s));
            },
        };
        let request = ShipmentRequest {
            order_id: order.order_id.clone(),
            user_id: order.user_id.clone(),
            items: items.to_vec(),
            total_amount: order.total_amount,
            weight_grams,
            dimensions,
        };
        match self.bounded(self.provider.create_shipment(request)).await {
            Ok(created) => {
                let shipment = self
                    .db
                    .mark_shipment_created(shipment.id, &created.provider_shipment_id, created.awb_number.as_deref())
                    .await?;
                info!(
                    "📦️ Shipment #{} created for {} (provider id {}, AWB {})",
                    shipment.id,
                    order.order_id,
                    created.provider_shipment_id,
                    created.awb_number.as_deref().unwrap_or("pending")
                );
                Ok(ShipmentCreation::Created(shipment))
            },
            Err(e) => {
                let msg = e.to_string();
                error!("📦️ Shipment creation for {} failed. An operator can retry it. {msg}", order.order_id);
                let shipment = self.db.mark_shipment_failed(shipment.id, &msg).await?;
                Ok(ShipmentCreation::Failed(shipment, msg))
            },
        }
    }

    fn declared_weight(&self, items: &[OrderItem]) -> i64 {
        items
            .iter()
            .map(|i| i.weight_grams.unwrap_or(self.config.default_item_weight_grams) * i.quantity)
            .sum()
    }

    async fn notify_order_paid(&self, order: &Order, items: &[OrderItem]) -> StepResult {
        let sellers = items.iter().map(|i| i.brand_id.clone()).collect::<BTreeSet<_>>();
        let mut notes = vec![Notification::new(
            Recipient::Buyer(order.user_id.clone()),
            order.order_id.clone(),
            NotificationKind::OrderConfirmed,
        )];
        notes.extend(
            sellers
                .into_iter()
                .map(|brand| Notification::new(Recipient::Seller(brand), order.order_id.clone(), NotificationKind::NewSale)),
        );
        let total = notes.len();
        let results = join_all(notes.into_iter().map(|note| async move {
            let recipient = note.recipient.clone();
            self.bounded(self.notifier.notify(note)).await.map_err(|e| (recipient, e))
        }))
        .await;
        let failures = results
            .into_iter()
            .filter_map(|r| r.err())
            .inspect(|(recipient, e)| warn!("📦️ Could not notify {recipient} about {}. {e}", order.order_id))
            .count();
        if failures == 0 {
            StepResult::Completed
        } else {
            StepResult::Failed(format!("{failures} of {total} notifications failed"))
        }
    }

    async fn invalidate_cache(&self, order_id: &OrderId) {
        let keys = cache_keys_for_order(order_id, &[]);
        if let Err(e) = self.bounded(self.cache.invalidate(keys)).await {
            warn!("📦️ Cache invalidation for {order_id} failed. {e}");
        }
    }

    /// Bounds an external call by the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, DownstreamError>
    where F: Future<Output = Result<T, DownstreamError>> {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DownstreamError::Timeout),
        }
    }

    /// Walks the order forward to the status implied by its shipment, one legal step at a time.
    async fn advance_order(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
        reason: &str,
    ) -> Result<Option<OrderStatusType>, ReconciliationError> {
        let (order, _) = self
            .db
            .fetch_order_with_items(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
        let mut current = order.status;
        let mut advanced = None;
        while current != target {
            let next = match (current, target) {
                (OrderStatusType::Processing, OrderStatusType::Shipped | OrderStatusType::Delivered) => {
                    OrderStatusType::Shipped
                },
                (OrderStatusType::Shipped, OrderStatusType::Delivered) => OrderStatusType::Delivered,
                _ => {
                    debug!("📦️ Order {order_id} is {current}. Shipment progress does not move it to {target}");
                    break;
                },
            };
            match self.db.advance_order_status(order_id, current, next, SHIPPING_ACTOR, reason).await? {
                StatusChange::Applied(order) => {
                    info!("📦️ Order {order_id} moved from {current} to {next} by shipment progress");
                    let previous = current;
                    current = order.status;
                    advanced = Some(current);
                    self.invalidate_cache(order_id).await;
                    self.notify_status_change(OrderStatusChangedEvent::new(order, previous, SHIPPING_ACTOR)).await;
                },
                StatusChange::Stale(order) => {
                    warn!(
                        "📦️ Order {order_id} changed to {} concurrently while shipment progress moved it to {next}. \
                         Leaving it as is.",
                        order.status
                    );
                    break;
                },
            }
        }
        Ok(advanced)
    }
}

impl<B, P, N, C> FulfillmentApi<B, P, N, C>
where
    B: FulfillmentStore + DiscrepancyManagement,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    /// Handles a tracking callback from the shipment provider.
    ///
    /// * A callback for an AWB we do not know is recorded as an orphan discrepancy and otherwise ignored.
    /// * Measured weight or dimensions outside tolerance are recorded as discrepancies.
    /// * The shipment status is updated, and the order is moved to `Shipped` or `Delivered` as appropriate.
    pub async fn process_shipment_update(
        &self,
        update: ShipmentUpdate,
    ) -> Result<ShipmentUpdateOutcome, ReconciliationError> {
        let awb = update.awb_number.trim();
        if awb.is_empty() {
            return Err(ReconciliationError::InvalidEvent("The AWB number is empty".into()));
        }
        let shipment = match self.db.fetch_shipment_by_awb(awb).await? {
            Some(s) => s,
            None => {
                let details = format!("Callback with status '{}' for unknown AWB {awb}", update.status);
                warn!("🚚️ {details}");
                let d = self.record(NewDiscrepancy::new(awb, DiscrepancyKind::OrphanShipmentCallback, details)).await?;
                return Ok(ShipmentUpdateOutcome { shipment: None, discrepancies: vec![d], order_status: None });
            },
        };
        let mut discrepancies = Vec::new();
        for d in self.measurement_discrepancies(&shipment, &update) {
            discrepancies.push(self.record(d).await?);
        }
        let new_status = match ShipmentStatus::from_provider_status(&update.status) {
            Some(s) => s,
            None => {
                warn!("🚚️ Unrecognised status '{}' for AWB {awb}. The shipment status is unchanged.", update.status);
                return Ok(ShipmentUpdateOutcome { shipment: Some(shipment), discrepancies, order_status: None });
            },
        };
        let shipment = if shipment.status == new_status {
            shipment
        } else {
            debug!("🚚️ Shipment #{} ({awb}) is now {new_status}", shipment.id);
            self.db.update_shipment_status(shipment.id, new_status).await?
        };
        let order_status = match new_status.implied_order_status() {
            Some(target) => {
                let reason = format!("Shipment {awb} is {new_status}");
                self.advance_order(&shipment.order_id, target, &reason).await?
            },
            None => None,
        };
        Ok(ShipmentUpdateOutcome { shipment: Some(shipment), discrepancies, order_status })
    }

    fn measurement_discrepancies(&self, shipment: &Shipment, update: &ShipmentUpdate) -> Vec<NewDiscrepancy> {
        let mut result = Vec::new();
        let order_ref = shipment.order_id.as_str();
        let awb = update.awb_number.trim();
        if let (Some(declared), Some(measured)) = (shipment.weight_grams, update.weight_grams) {
            if (declared - measured).abs() > self.config.weight_tolerance_grams {
                let details = format!("AWB {awb}: declared {declared} g, measured {measured} g");
                warn!("🚚️ Weight mismatch on {order_ref}. {details}");
                result.push(NewDiscrepancy::new(order_ref, DiscrepancyKind::ShipmentWeightMismatch, details));
            }
        }
        if let (Some(declared), Some(measured)) = (shipment.dimensions(), update.dimensions) {
            if !within_tolerance(&declared, &measured, self.config.dimension_tolerance_cm) {
                let details = format!("AWB {awb}: declared {declared}, measured {measured}");
                warn!("🚚️ Dimension mismatch on {order_ref}. {details}");
                result.push(NewDiscrepancy::new(order_ref, DiscrepancyKind::ShipmentDimensionMismatch, details));
            }
        }
        result
    }

    async fn record(&self, discrepancy: NewDiscrepancy) -> Result<Discrepancy, ReconciliationError> {
        let (d, _) = self.db.record_discrepancy(discrepancy).await?;
        Ok(d)
    }
}

fn within_tolerance(declared: &Dimensions, measured: &Dimensions, tolerance: i64) -> bool {
    (declared.length_cm - measured.length_cm).abs() <= tolerance &&
        (declared.breadth_cm - measured.breadth_cm).abs() <= tolerance &&
        (declared.height_cm - measured.height_cm).abs() <= tolerance
}
