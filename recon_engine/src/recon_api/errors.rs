use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    helpers::DocumentError,
    traits::{DownstreamError, StoreError},
};

/// Every way a reconciliation operation can fail. Each variant maps to exactly one HTTP status at the server boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("The signature is invalid")]
    SignatureInvalid,
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Shipment #{0} does not exist")]
    ShipmentNotFound(i64),
    #[error("Discrepancy #{0} does not exist")]
    DiscrepancyNotFound(i64),
    #[error("The event conflicts with the committed state of order {order_ref}. {reason}")]
    ConflictingStateTransition { order_ref: OrderId, reason: String },
    #[error("Precondition failed. {0}")]
    PreconditionFailed(String),
    #[error("Order status cannot change from {from} to {to}")]
    ForbiddenTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} was modified concurrently. Reload the order and try again.")]
    ConcurrentModification(OrderId),
    #[error("The actor is not permitted to modify order {0}")]
    ActorNotPermitted(OrderId),
    #[error("A downstream service is unavailable. {0}")]
    DownstreamUnavailable(String),
    #[error("The provider returned an invalid document. {0}")]
    InvalidDocument(String),
    #[error("Could not persist the change. {0}")]
    PersistenceFailure(String),
    #[error("Invalid event. {0}")]
    InvalidEvent(String),
}

impl From<StoreError> for ReconciliationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::IntentNotFound(id) | StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::ShipmentNotFound(id) => Self::ShipmentNotFound(id),
            StoreError::DiscrepancyNotFound(id) => Self::DiscrepancyNotFound(id),
            StoreError::DiscrepancyAlreadyResolved(id) => {
                Self::PreconditionFailed(format!("Discrepancy #{id} has already been resolved"))
            },
            StoreError::DatabaseError(s) | StoreError::InvalidData(s) => Self::PersistenceFailure(s),
        }
    }
}

impl From<DownstreamError> for ReconciliationError {
    fn from(e: DownstreamError) -> Self {
        Self::DownstreamUnavailable(e.to_string())
    }
}

impl From<DocumentError> for ReconciliationError {
    fn from(e: DocumentError) -> Self {
        Self::InvalidDocument(e.to_string())
    }
}
