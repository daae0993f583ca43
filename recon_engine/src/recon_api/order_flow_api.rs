use std::{fmt::Debug, time::Duration};

use log::*;
use recon_common::Secret;

use crate::{
    db_types::{
        Actor,
        ActorRole,
        CartItem,
        Discrepancy,
        DiscrepancyKind,
        NewDiscrepancy,
        NewOrderIntent,
        Order,
        OrderId,
        OrderIntent,
        OrderItem,
        OrderStatusType,
        PaymentStatus,
    },
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent},
    helpers::signature::verify_client_confirmation,
    recon_api::{
        errors::ReconciliationError,
        order_objects::{OrderDetails, PaymentEvent, TransitionOutcome},
    },
    traits::{
        cache_keys_for_order,
        CatalogCache,
        DiscrepancyManagement,
        FailedTransition,
        OrderStore,
        PaidTransition,
        StatusChange,
        StoreError,
    },
};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// `OrderFlowApi` is the payment reconciliation state machine. It consumes verified [`PaymentEvent`]s, decides
/// whether the transition they describe is legal, and applies it atomically through the [`OrderStore`].
///
/// The rules, in short:
/// * Payment moves `Pending → Paid | Failed`, and the first terminal state to be committed wins.
/// * Re-applying an event that has already been applied is a successful no-op with no side effects.
/// * A later event that contradicts the committed state is recorded as a [`Discrepancy`] and rejected.
/// * Side effects (fulfillment, notifications, cache invalidation) only happen after a commit.
pub struct OrderFlowApi<B, C> {
    db: B,
    cache: C,
    producers: EventProducers,
    confirmation_secret: Secret<String>,
    call_timeout: Duration,
}

impl<B, C> Debug for OrderFlowApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, C> OrderFlowApi<B, C> {
    pub fn new(db: B, cache: C, producers: EventProducers, confirmation_secret: Secret<String>) -> Self {
        Self { db, cache, producers, confirmation_secret, call_timeout: DEFAULT_CALL_TIMEOUT }
    }

    /// Bounds the cache invalidation that runs on the webhook response path.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, C> OrderFlowApi<B, C>
where
    B: OrderStore + DiscrepancyManagement,
    C: CatalogCache,
{
    /// Stores the intent for a checkout that has just begun. Submitting the same reference twice returns the original
    /// intent.
    ///
    /// Lines for the same product variant are merged into one, since purchase records are kept per variant.
    pub async fn create_intent(&self, mut intent: NewOrderIntent) -> Result<OrderIntent, ReconciliationError> {
        if intent.external_ref.as_str().trim().is_empty() {
            return Err(ReconciliationError::InvalidEvent("The order reference is empty".into()));
        }
        if intent.cart.is_empty() || intent.cart.iter().any(|i| i.quantity <= 0) {
            return Err(ReconciliationError::InvalidEvent("The cart must contain at least one item".into()));
        }
        intent.cart = merge_cart_lines(intent.cart).map_err(ReconciliationError::InvalidEvent)?;
        let (intent, inserted) = self.db.insert_intent(intent).await?;
        if inserted {
            info!("🔄️ New order intent {} for {}", intent.external_ref, intent.total_amount);
        }
        Ok(intent)
    }

    /// Applies a single event to the state machine.
    pub async fn apply(&self, event: PaymentEvent) -> Result<TransitionOutcome, ReconciliationError> {
        event.validate().map_err(ReconciliationError::InvalidEvent)?;
        trace!("🔄️ Applying {event}");
        match event {
            PaymentEvent::PaymentCaptured { order_ref, payment_id, method } => {
                self.capture_payment(&order_ref, &payment_id, method.as_deref()).await
            },
            PaymentEvent::PaymentFailed { order_ref, payment_id, method } => {
                self.fail_payment(&order_ref, &payment_id, method.as_deref()).await
            },
            PaymentEvent::ClientConfirmed { order_ref, payment_id, signature } => {
                let secret = self.confirmation_secret.reveal();
                if !verify_client_confirmation(order_ref.as_str(), &payment_id, &signature, secret) {
                    warn!("🔄️ Client confirmation for {order_ref} ({payment_id}) has an invalid signature");
                    return Err(ReconciliationError::SignatureInvalid);
                }
                self.capture_payment(&order_ref, &payment_id, None).await
            },
            PaymentEvent::ManualStatusOverride { order_id, new_status, actor, reason } => {
                let reason = reason.unwrap_or_else(|| "Manual override".to_string());
                self.override_status(&order_id, new_status, &actor, &reason).await
            },
        }
    }

    /// Fetches the intent, order, items, shipments and status history for an order reference.
    pub async fn order_details(&self, order_ref: &OrderId) -> Result<OrderDetails, ReconciliationError> {
        let intent = self.db.fetch_intent(order_ref).await?;
        let order = self.db.fetch_order(order_ref).await?;
        if intent.is_none() && order.is_none() {
            return Err(ReconciliationError::OrderNotFound(order_ref.clone()));
        }
        let (items, shipments, status_log) = match &order {
            Some(_) => (
                self.db.fetch_order_items(order_ref).await?,
                self.db.fetch_shipments_for_order(order_ref).await?,
                self.db.fetch_status_log(order_ref).await?,
            ),
            None => (vec![], vec![], vec![]),
        };
        Ok(OrderDetails { intent, order, items, shipments, status_log })
    }

    async fn capture_payment(
        &self,
        order_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<TransitionOutcome, ReconciliationError> {
        match self.db.mark_paid(order_ref, payment_id, method).await {
            Ok(PaidTransition::Committed { order, items }) => {
                info!("🔄️ Order {order_ref} is paid ({payment_id}). Dispatching fulfillment.");
                self.after_paid(&order, &items).await;
                Ok(TransitionOutcome::OrderPaid(order))
            },
            Ok(PaidTransition::NotPending(intent)) => self.resolve_late_capture(intent, payment_id).await,
            Err(StoreError::IntentNotFound(_)) => self.unknown_reference(order_ref, "capture", payment_id).await,
            Err(e) => {
                error!("🔄️ Could not commit payment {payment_id} for {order_ref}. {e}");
                Err(ReconciliationError::PersistenceFailure(e.to_string()))
            },
        }
    }

    /// A capture arrived for an intent that is no longer pending. Either it is a redelivery of the capture that won, or
    /// it contradicts the committed state.
    async fn resolve_late_capture(
        &self,
        intent: OrderIntent,
        payment_id: &str,
    ) -> Result<TransitionOutcome, ReconciliationError> {
        let order_ref = intent.external_ref.clone();
        let committed_id = intent.payment_id.clone().unwrap_or_default();
        match intent.payment_status {
            PaymentStatus::Paid if committed_id == payment_id => {
                debug!("🔄️ Capture {payment_id} for {order_ref} has already been applied");
                Ok(TransitionOutcome::AlreadyApplied)
            },
            PaymentStatus::Paid => {
                let details = format!("Capture {payment_id} received after order was paid by {committed_id}");
                warn!("🔄️ {order_ref}: {details}");
                self.record(NewDiscrepancy::new(order_ref.as_str(), DiscrepancyKind::DuplicateCapture, &details))
                    .await?;
                Err(ReconciliationError::ConflictingStateTransition { order_ref, reason: details })
            },
            PaymentStatus::Failed => {
                let details = format!("Capture {payment_id} received after payment {committed_id} failed");
                warn!("🔄️ {order_ref}: {details}");
                self.record(NewDiscrepancy::new(order_ref.as_str(), DiscrepancyKind::OutOfOrderPaymentEvent, &details))
                    .await?;
                Err(ReconciliationError::ConflictingStateTransition { order_ref, reason: details })
            },
            PaymentStatus::Pending => {
                error!("🔄️ Intent {order_ref} is pending, but the paid transition did not apply");
                Err(ReconciliationError::PersistenceFailure(format!("Intent {order_ref} could not be marked paid")))
            },
        }
    }

    async fn fail_payment(
        &self,
        order_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<TransitionOutcome, ReconciliationError> {
        match self.db.mark_failed(order_ref, payment_id, method).await {
            Ok(FailedTransition::Committed(intent)) => {
                info!("🔄️ Payment {payment_id} for {order_ref} failed");
                self.invalidate_cache(order_ref, &[]).await;
                Ok(TransitionOutcome::PaymentFailed(intent))
            },
            Ok(FailedTransition::NotPending(intent)) => {
                let committed_id = intent.payment_id.clone().unwrap_or_default();
                match intent.payment_status {
                    PaymentStatus::Failed => {
                        if committed_id != payment_id {
                            warn!(
                                "🔄️ Failure {payment_id} for {order_ref} ignored. The intent already failed with \
                                 {committed_id}"
                            );
                        }
                        Ok(TransitionOutcome::AlreadyApplied)
                    },
                    PaymentStatus::Paid => {
                        let details = format!("Failure {payment_id} received after order was paid by {committed_id}");
                        warn!("🔄️ {order_ref}: {details}");
                        let d = NewDiscrepancy::new(order_ref.as_str(), DiscrepancyKind::OutOfOrderPaymentEvent, &details);
                        self.record(d).await?;
                        Err(ReconciliationError::ConflictingStateTransition { order_ref: order_ref.clone(), reason: details })
                    },
                    PaymentStatus::Pending => Err(ReconciliationError::PersistenceFailure(format!(
                        "Intent {order_ref} could not be marked failed"
                    ))),
                }
            },
            Err(StoreError::IntentNotFound(_)) => self.unknown_reference(order_ref, "failure", payment_id).await,
            Err(e) => {
                error!("🔄️ Could not commit failed payment {payment_id} for {order_ref}. {e}");
                Err(ReconciliationError::PersistenceFailure(e.to_string()))
            },
        }
    }

    async fn unknown_reference(
        &self,
        order_ref: &OrderId,
        what: &str,
        payment_id: &str,
    ) -> Result<TransitionOutcome, ReconciliationError> {
        let details = format!("Payment {what} {payment_id} references an unknown order");
        warn!("🔄️ {order_ref}: {details}");
        self.record(NewDiscrepancy::new(order_ref.as_str(), DiscrepancyKind::UnknownOrderReference, &details)).await?;
        Err(ReconciliationError::OrderNotFound(order_ref.clone()))
    }

    async fn override_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        actor: &Actor,
        reason: &str,
    ) -> Result<TransitionOutcome, ReconciliationError> {
        let order = match self.db.fetch_order(order_id).await? {
            Some(order) => order,
            None => {
                return match self.db.fetch_intent(order_id).await? {
                    Some(intent) => Err(ReconciliationError::PreconditionFailed(format!(
                        "Order {order_id} cannot be modified because its payment is {}",
                        intent.payment_status
                    ))),
                    None => Err(ReconciliationError::OrderNotFound(order_id.clone())),
                };
            },
        };
        if order.payment_status != PaymentStatus::Paid {
            return Err(ReconciliationError::PreconditionFailed(format!(
                "Order {order_id} cannot be modified because its payment is {}",
                order.payment_status
            )));
        }
        let items = self.db.fetch_order_items(order_id).await?;
        if !actor_may_modify(actor, &items) {
            warn!("🔄️ {actor} attempted to change the status of {order_id}, which has none of their items");
            return Err(ReconciliationError::ActorNotPermitted(order_id.clone()));
        }
        let old_status = order.status;
        if old_status == new_status {
            debug!("🔄️ Order {order_id} is already {new_status}");
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        if !old_status.can_transition_to(new_status) {
            return Err(ReconciliationError::ForbiddenTransition { from: old_status, to: new_status });
        }
        let changed_by = actor.to_string();
        match self.db.update_order_status(order_id, old_status, new_status, &changed_by, reason).await? {
            StatusChange::Applied(order) => {
                info!("🔄️ {changed_by} moved order {order_id} from {old_status} to {new_status}");
                self.invalidate_cache(order_id, &items).await;
                let event = OrderStatusChangedEvent::new(order.clone(), old_status, changed_by);
                self.producers.publish_status_changed(event).await;
                Ok(TransitionOutcome::StatusChanged(order))
            },
            StatusChange::Stale(current) => {
                warn!(
                    "🔄️ Order {order_id} changed to {} while {changed_by} was moving it to {new_status}",
                    current.status
                );
                Err(ReconciliationError::ConcurrentModification(order_id.clone()))
            },
        }
    }

    async fn after_paid(&self, order: &Order, items: &[OrderItem]) {
        self.invalidate_cache(&order.order_id, items).await;
        let event = OrderPaidEvent::new(order.clone(), items.to_vec());
        self.producers.publish_order_paid(event).await;
    }

    async fn invalidate_cache(&self, order_id: &OrderId, items: &[OrderItem]) {
        let keys = cache_keys_for_order(order_id, items);
        match tokio::time::timeout(self.call_timeout, self.cache.invalidate(keys)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                warn!("🔄️ Cache invalidation for {order_id} failed. Stale entries will expire on their own. {e}")
            },
            Err(_) => warn!("🔄️ Cache invalidation for {order_id} timed out. Stale entries will expire on their own."),
        }
    }

    async fn record(&self, discrepancy: NewDiscrepancy) -> Result<Discrepancy, ReconciliationError> {
        let (d, inserted) = self.db.record_discrepancy(discrepancy).await.map_err(|e| {
            error!("🔄️ Could not record discrepancy. {e}");
            ReconciliationError::PersistenceFailure(e.to_string())
        })?;
        if !inserted {
            debug!("🔄️ Discrepancy #{} had already been recorded", d.id);
        }
        Ok(d)
    }
}

/// Admins may change any order. Brands may only change orders containing at least one of their items.
fn actor_may_modify(actor: &Actor, items: &[OrderItem]) -> bool {
    match (actor.role, actor.brand_id.as_deref()) {
        (ActorRole::Admin, _) => true,
        (ActorRole::Brand, Some(brand)) => items.iter().any(|i| i.brand_id == brand),
        (ActorRole::Brand, None) => false,
    }
}

/// Folds cart lines for the same product variant into one line. Lines that name the same variant but disagree on
/// anything other than quantity cannot be merged.
fn merge_cart_lines(cart: Vec<CartItem>) -> Result<Vec<CartItem>, String> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(cart.len());
    for line in cart {
        let existing = merged.iter_mut().find(|m| m.product_id == line.product_id && m.variant_id == line.variant_id);
        match existing {
            None => merged.push(line),
            Some(m) if m.brand_id == line.brand_id &&
                m.unit_price == line.unit_price &&
                m.weight_grams == line.weight_grams =>
            {
                m.quantity += line.quantity;
            },
            Some(m) => {
                return Err(format!(
                    "The cart has conflicting lines for product {} ({})",
                    m.product_id,
                    m.variant_id.as_deref().unwrap_or("no variant")
                ));
            },
        }
    }
    Ok(merged)
}
