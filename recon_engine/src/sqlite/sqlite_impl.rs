//! `SqliteDatabase` is a concrete implementation of a reconciliation engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, discrepancies, intents, new_pool, orders, outbox, purchases, shipments};
use crate::{
    db_types::{
        Discrepancy,
        DocumentKind,
        NewDiscrepancy,
        NewOrderIntent,
        NewPurchaseRecord,
        NewShipment,
        Order,
        OrderId,
        OrderIntent,
        OrderItem,
        OrderStatusType,
        OutboxEntry,
        Shipment,
        ShipmentStatus,
        StatusLogEntry,
        ORDER_PAID_EVENT,
    },
    traits::{
        DiscrepancyFilter,
        DiscrepancyManagement,
        FailedTransition,
        FulfillmentStore,
        OrderStore,
        Page,
        Pagination,
        PaidTransition,
        ShipmentSlot,
        StatusChange,
        StoreError,
    },
};

const PAYMENT_GATEWAY_ACTOR: &str = "payment_gateway";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Runs the embedded migrations against this database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The number of purchase records stored for the order.
    pub async fn count_purchase_records(&self, order_id: &OrderId) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count = purchases::count_for_order(order_id, &mut conn).await?;
        Ok(count)
    }

    async fn change_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        actor: &str,
        reason: &str,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;
        match orders::update_status_if(order_id, from, to, &mut tx).await? {
            Some(order) => {
                orders::insert_status_log(order_id, Some(from), to, actor, reason, &mut tx).await?;
                tx.commit().await?;
                debug!("🗃️ Order {order_id} moved from {from} to {to} by {actor}");
                Ok(StatusChange::Applied(order))
            },
            None => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let current = orders::fetch_order(order_id, &mut conn)
                    .await?
                    .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
                debug!("🗃️ Order {order_id} is {} and not {from}. Status was not changed to {to}", current.status);
                Ok(StatusChange::Stale(current))
            },
        }
    }
}

impl OrderStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_intent(&self, intent: NewOrderIntent) -> Result<(OrderIntent, bool), StoreError> {
        let mut conn = self.pool.acquire().await?;
        intents::idempotent_insert(intent, &mut conn).await
    }

    async fn fetch_intent(&self, external_ref: &OrderId) -> Result<Option<OrderIntent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let intent = intents::fetch_intent(external_ref, &mut conn).await?;
        Ok(intent)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_shipments_for_order(&self, order_id: &OrderId) -> Result<Vec<Shipment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shipments = shipments::fetch_for_order(order_id, &mut conn).await?;
        Ok(shipments)
    }

    async fn fetch_status_log(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let log = orders::fetch_status_log(order_id, &mut conn).await?;
        Ok(log)
    }

    /// The intent update is the first statement of the transaction. Concurrent deliveries for the same reference
    /// serialize on SQLite's write lock, and exactly one of them sees a `Pending` row.
    async fn mark_paid(
        &self,
        external_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<PaidTransition, StoreError> {
        let mut tx = self.pool.begin().await?;
        match intents::mark_intent_paid(external_ref, payment_id, method, &mut tx).await? {
            Some(intent) => {
                let order = orders::insert_order_for_intent(&intent, &mut tx).await?;
                let items = orders::insert_items_for_intent(&intent, &mut tx).await?;
                outbox::insert_entry(&order.order_id, ORDER_PAID_EVENT, &mut tx).await?;
                orders::insert_status_log(
                    &order.order_id,
                    None,
                    order.status,
                    PAYMENT_GATEWAY_ACTOR,
                    &format!("Payment {payment_id} captured"),
                    &mut tx,
                )
                .await?;
                tx.commit().await?;
                debug!("🗃️ Intent {external_ref} is paid ({payment_id}). Order committed with {} items", items.len());
                Ok(PaidTransition::Committed { order, items })
            },
            None => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let intent = intents::fetch_intent(external_ref, &mut conn)
                    .await?
                    .ok_or_else(|| StoreError::IntentNotFound(external_ref.clone()))?;
                trace!("🗃️ Intent {external_ref} is already {}. Paid transition not applied", intent.payment_status);
                Ok(PaidTransition::NotPending(intent))
            },
        }
    }

    async fn mark_failed(
        &self,
        external_ref: &OrderId,
        payment_id: &str,
        method: Option<&str>,
    ) -> Result<FailedTransition, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match intents::mark_intent_failed(external_ref, payment_id, method, &mut conn).await? {
            Some(intent) => {
                debug!("🗃️ Intent {external_ref} marked as failed ({payment_id})");
                Ok(FailedTransition::Committed(intent))
            },
            None => {
                let intent = intents::fetch_intent(external_ref, &mut conn)
                    .await?
                    .ok_or_else(|| StoreError::IntentNotFound(external_ref.clone()))?;
                Ok(FailedTransition::NotPending(intent))
            },
        }
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        actor: &str,
        reason: &str,
    ) -> Result<StatusChange, StoreError> {
        self.change_status(order_id, from, to, actor, reason).await
    }
}

impl FulfillmentStore for SqliteDatabase {
    async fn fetch_order_with_items(&self, order_id: &OrderId) -> Result<Option<(Order, Vec<OrderItem>)>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = match orders::fetch_order(order_id, &mut conn).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = orders::fetch_items(order_id, &mut conn).await?;
        Ok(Some((order, items)))
    }

    async fn claim_outbox_entry(
        &self,
        order_id: &OrderId,
        event_type: &str,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = outbox::claim_entry(order_id, event_type, lease, &mut conn).await?;
        Ok(claimed)
    }

    async fn complete_outbox_entry(&self, order_id: &OrderId, event_type: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        outbox::complete_entry(order_id, event_type, &mut conn).await?;
        Ok(())
    }

    async fn fetch_pending_outbox_entries(
        &self,
        grace_period: Duration,
        lease: Duration,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = outbox::fetch_pending(grace_period, lease, &mut conn).await?;
        Ok(entries)
    }

    async fn record_purchases(&self, records: Vec<NewPurchaseRecord>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for record in &records {
            if purchases::insert_or_ignore(record, &mut tx).await? {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn reserve_shipment(&self, shipment: NewShipment, reclaim_after: Duration) -> Result<ShipmentSlot, StoreError> {
        let mut tx = self.pool.begin().await?;
        let slot = shipments::reserve(shipment, reclaim_after, &mut tx).await?;
        tx.commit().await?;
        Ok(slot)
    }

    async fn mark_shipment_created(
        &self,
        shipment_id: i64,
        provider_shipment_id: &str,
        awb_number: Option<&str>,
    ) -> Result<Shipment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shipments::mark_created(shipment_id, provider_shipment_id, awb_number, &mut conn).await
    }

    async fn mark_shipment_failed(&self, shipment_id: i64, error: &str) -> Result<Shipment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shipments::mark_failed(shipment_id, error, &mut conn).await
    }

    async fn fetch_shipment(&self, shipment_id: i64) -> Result<Option<Shipment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shipment = shipments::fetch_shipment(shipment_id, &mut conn).await?;
        Ok(shipment)
    }

    async fn fetch_shipment_by_awb(&self, awb: &str) -> Result<Option<Shipment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shipment = shipments::fetch_by_awb(awb, &mut conn).await?;
        Ok(shipment)
    }

    async fn update_shipment_status(&self, shipment_id: i64, status: ShipmentStatus) -> Result<Shipment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shipments::update_status(shipment_id, status, &mut conn).await
    }

    async fn set_document_url(&self, shipment_id: i64, kind: DocumentKind, url: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        shipments::set_document_url(shipment_id, kind, url, &mut conn).await
    }

    async fn advance_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        actor: &str,
        reason: &str,
    ) -> Result<StatusChange, StoreError> {
        self.change_status(order_id, from, to, actor, reason).await
    }
}

impl DiscrepancyManagement for SqliteDatabase {
    async fn record_discrepancy(&self, discrepancy: NewDiscrepancy) -> Result<(Discrepancy, bool), StoreError> {
        let mut conn = self.pool.acquire().await?;
        discrepancies::idempotent_insert(discrepancy, &mut conn).await
    }

    async fn fetch_discrepancy(&self, id: i64) -> Result<Option<Discrepancy>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let d = discrepancies::fetch_discrepancy(id, &mut conn).await?;
        Ok(d)
    }

    async fn search_discrepancies(
        &self,
        filter: DiscrepancyFilter,
        pagination: Pagination,
    ) -> Result<Page<Discrepancy>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let page = discrepancies::search(filter, pagination, &mut conn).await?;
        Ok(page)
    }

    async fn resolve_discrepancy(&self, id: i64, resolved_by: &str, note: &str) -> Result<Discrepancy, StoreError> {
        let mut conn = self.pool.acquire().await?;
        discrepancies::resolve(id, resolved_by, note, &mut conn).await
    }
}
