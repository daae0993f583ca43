use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Order, OrderId, OrderIntent, OrderItem, OrderStatusType, Shipment, StatusLogEntry};

/// The inputs to the payment reconciliation state machine. Loosely-typed gateway payloads are converted into one of
/// these at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentEvent {
    /// The gateway captured the payment (webhook).
    PaymentCaptured { order_ref: OrderId, payment_id: String, method: Option<String> },
    /// The gateway reported the payment as failed (webhook).
    PaymentFailed { order_ref: OrderId, payment_id: String, method: Option<String> },
    /// The buyer's browser returned from the gateway with a signed confirmation.
    ClientConfirmed { order_ref: OrderId, payment_id: String, signature: String },
    /// A brand or admin changed the fulfillment status from the dashboard.
    ManualStatusOverride { order_id: OrderId, new_status: OrderStatusType, actor: Actor, reason: Option<String> },
}

impl PaymentEvent {
    pub fn order_ref(&self) -> &OrderId {
        match self {
            PaymentEvent::PaymentCaptured { order_ref, .. } => order_ref,
            PaymentEvent::PaymentFailed { order_ref, .. } => order_ref,
            PaymentEvent::ClientConfirmed { order_ref, .. } => order_ref,
            PaymentEvent::ManualStatusOverride { order_id, .. } => order_id,
        }
    }

    /// Boundary validation. Identifiers must be non-empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.order_ref().as_str().trim().is_empty() {
            return Err("The order reference is empty".into());
        }
        match self {
            PaymentEvent::PaymentCaptured { payment_id, .. } |
            PaymentEvent::PaymentFailed { payment_id, .. } |
            PaymentEvent::ClientConfirmed { payment_id, .. }
                if payment_id.trim().is_empty() =>
            {
                Err("The payment id is empty".into())
            },
            PaymentEvent::ClientConfirmed { signature, .. } if signature.trim().is_empty() => {
                Err("The confirmation signature is empty".into())
            },
            PaymentEvent::ManualStatusOverride { actor, .. } if actor.id.trim().is_empty() => {
                Err("The actor id is empty".into())
            },
            _ => Ok(()),
        }
    }
}

impl Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentEvent::PaymentCaptured { order_ref, payment_id, .. } => {
                write!(f, "PaymentCaptured({order_ref}, {payment_id})")
            },
            PaymentEvent::PaymentFailed { order_ref, payment_id, .. } => {
                write!(f, "PaymentFailed({order_ref}, {payment_id})")
            },
            PaymentEvent::ClientConfirmed { order_ref, payment_id, .. } => {
                write!(f, "ClientConfirmed({order_ref}, {payment_id})")
            },
            PaymentEvent::ManualStatusOverride { order_id, new_status, actor, .. } => {
                write!(f, "ManualStatusOverride({order_id}, {new_status}, {actor})")
            },
        }
    }
}

/// The successful results of applying a [`PaymentEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    /// The order was committed as paid. Fulfillment has been dispatched.
    OrderPaid(Order),
    /// The intent was committed as failed.
    PaymentFailed(OrderIntent),
    /// The fulfillment status changed.
    StatusChanged(Order),
    /// The event had already been applied. Nothing changed and no side effects were triggered.
    AlreadyApplied,
}

impl TransitionOutcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, TransitionOutcome::AlreadyApplied)
    }
}

/// Everything known about an order reference, for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub intent: Option<OrderIntent>,
    pub order: Option<Order>,
    pub items: Vec<OrderItem>,
    pub shipments: Vec<Shipment>,
    pub status_log: Vec<StatusLogEntry>,
}
