use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderIntent, OrderItem, Shipment};

/// The result of attempting the `Pending → Paid` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaidTransition {
    /// This call won the race. The order and its items were committed.
    Committed { order: Order, items: Vec<OrderItem> },
    /// The intent had already reached a terminal state. Nothing was written.
    NotPending(OrderIntent),
}

/// The result of attempting the `Pending → Failed` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedTransition {
    Committed(OrderIntent),
    NotPending(OrderIntent),
}

/// The result of a conditional fulfillment status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Applied(Order),
    /// The order was no longer in the expected status. Carries the order as it is now.
    Stale(Order),
}

/// The result of reserving the shipment row for an order before calling the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipmentSlot {
    /// The caller owns this `Requested` shipment and should create it with the provider.
    Reserved(Shipment),
    /// A shipment already exists (or is being created) for this order.
    Existing(Shipment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: i64,
    pub count: i64,
}

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, count: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    /// Creates a pagination window, clamping nonsensical values rather than failing.
    pub fn new(offset: i64, count: i64) -> Self {
        let offset = offset.max(0);
        let count = count.clamp(1, MAX_PAGE_SIZE);
        Self { offset, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The total number of records matching the query, irrespective of the pagination window
    pub total: i64,
    pub offset: i64,
    pub count: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: i64, pagination: Pagination, items: Vec<T>) -> Self {
        Self { total, offset: pagination.offset, count: pagination.count, items }
    }
}
