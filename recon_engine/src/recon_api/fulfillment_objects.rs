use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};

use crate::db_types::{Dimensions, Discrepancy, OrderId, OrderStatusType, Shipment};

#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// Upper bound on every call to an external collaborator
    pub call_timeout: Duration,
    /// Measured weight may differ from the declared weight by this much before a discrepancy is raised
    pub weight_tolerance_grams: i64,
    pub dimension_tolerance_cm: i64,
    /// Used for line items that do not declare a weight
    pub default_item_weight_grams: i64,
    pub default_package: Dimensions,
    /// How long a claim on an outbox entry holds before the entry can be dispatched again
    pub outbox_lease: chrono::Duration,
    /// A shipment reservation that never reached the provider is taken over by automatic dispatch after this long
    pub stale_reservation: chrono::Duration,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            weight_tolerance_grams: 50,
            dimension_tolerance_cm: 1,
            default_item_weight_grams: 500,
            default_package: Dimensions { length_cm: 30, breadth_cm: 20, height_cm: 10 },
            outbox_lease: chrono::Duration::minutes(5),
            stale_reservation: chrono::Duration::minutes(2),
        }
    }
}

/// How one fulfillment step went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    Completed,
    Skipped(String),
    Failed(String),
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }
}

impl Display for StepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepResult::Completed => write!(f, "completed"),
            StepResult::Skipped(why) => write!(f, "skipped ({why})"),
            StepResult::Failed(why) => write!(f, "failed ({why})"),
        }
    }
}

/// The outcome of the post-payment side effects for one order. Failures are reported here, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentReport {
    pub order_id: OrderId,
    pub purchases: StepResult,
    pub shipment: StepResult,
    pub notifications: StepResult,
}

impl FulfillmentReport {
    pub fn is_complete(&self) -> bool {
        !(self.purchases.is_failed() || self.shipment.is_failed() || self.notifications.is_failed())
    }
}

impl Display for FulfillmentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: purchases {}, shipment {}, notifications {}",
            self.order_id, self.purchases, self.shipment, self.notifications
        )
    }
}

/// The result of trying to create the shipment for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipmentCreation {
    Created(Shipment),
    /// A shipment already exists or is in flight. The provider was not called.
    AlreadyExists(Shipment),
    /// The provider call failed. The shipment is persisted as `CreationFailed` with the error.
    Failed(Shipment, String),
}

/// A tracking callback from the shipment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentUpdate {
    pub awb_number: String,
    pub status: String,
    pub weight_grams: Option<i64>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentUpdateOutcome {
    /// `None` if the callback did not match any shipment
    pub shipment: Option<Shipment>,
    pub discrepancies: Vec<Discrepancy>,
    /// The order status after the update, if the order was advanced
    pub order_status: Option<OrderStatusType>,
}
