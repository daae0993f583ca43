use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusType};

/// Published once the `Pending → Paid` transition has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

/// Published after a committed fulfillment status change, whether manual or driven by shipment progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    /// Who made the change: a dashboard actor, or the name of the automated component
    pub changed_by: String,
}

impl OrderStatusChangedEvent {
    pub fn new<S: Into<String>>(order: Order, old_status: OrderStatusType, changed_by: S) -> Self {
        Self { order, old_status, changed_by: changed_by.into() }
    }

    pub fn new_status(&self) -> OrderStatusType {
        self.order.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}
