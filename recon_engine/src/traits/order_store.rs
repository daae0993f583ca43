use thiserror::Error;

use crate::{
    db_types::{NewOrderIntent, Order, OrderId, OrderIntent, OrderItem, OrderStatusType, Shipment, StatusLogEntry},
    traits::data_objects::{FailedTransition, PaidTransition, StatusChange},
};

/// The Order Store is the single source of truth for order state.
///
/// Backends must guarantee that the payment transitions are atomic: either every row that makes up a paid order
/// (intent update, order, items, outbox entry and status log) is committed, or none of them are.
///
/// All state-changing methods are conditional updates. They never overwrite a terminal state and report the state that
/// won instead.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order intent when checkout begins. This call is idempotent on `external_ref`.
    ///
    /// Returns the stored intent, and `true` if it was newly inserted.
    async fn insert_intent(&self, intent: NewOrderIntent) -> Result<(OrderIntent, bool), StoreError>;

    async fn fetch_intent(&self, external_ref: &OrderId) -> Result<Option<OrderIntent>, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError>;

    async fn fetch_shipments_for_order(&self, order_id: &OrderId) -> Result<Vec<Shipment>, StoreError>;

    async fn fetch_status_log(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, StoreError>;

    /// Marks the intent identified by `external_ref` as paid, and in the same transaction creates the order (in
    /// `Processing`), its items, an `OrderPaid` outbox entry and a status log entry.
    ///
    /// The intent update only succeeds if the intent is still `Pending`. Otherwise, nothing is written and the
    /// committed intent is returned as [`PaidTransition::NotPending`].
    ///
    /// Returns [`StoreError::IntentNotFound`] if no intent with the given reference exists.
    async fn mark_paid(
        &self,
        external_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<PaidTransition, StoreError>;

    /// Marks the intent as failed if, and only if, it is still `Pending`.
    async fn mark_failed(
        &self,
        external_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<FailedTransition, StoreError>;

    /// Changes the fulfillment status of an order from `from` to `to`, provided the status is still `from` when the
    /// update executes. A status log entry is written in the same transaction.
    ///
    /// If the status was changed concurrently, the current order is returned as [`StatusChange::Stale`].
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        actor: &str,
        reason: &str,
    ) -> Result<StatusChange, StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("No order intent exists for reference {0}")]
    IntentNotFound(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested shipment (id {0}) does not exist")]
    ShipmentNotFound(i64),
    #[error("The requested discrepancy (id {0}) does not exist")]
    DiscrepancyNotFound(i64),
    #[error("Discrepancy {0} has already been resolved")]
    DiscrepancyAlreadyResolved(i64),
    #[error("Invalid data in the store. {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
