//! # Backend and collaborator contracts
//!
//! This module defines the interfaces the reconciliation engine depends on. The engine never talks to a database or
//! an external service directly; it goes through these traits.
//!
//! ## Storage
//! * [`OrderStore`] persists intents, orders and shipments, and guarantees that the payment transitions are atomic
//!   and conditional.
//! * [`FulfillmentStore`] provides the storage behaviour the fulfillment coordinator needs from background tasks.
//! * [`DiscrepancyManagement`] is the append-only record of anomalies.
//!
//! ## External collaborators
//! * [`ShipmentProvider`] creates consignments and produces labels and manifests.
//! * [`Notifier`] delivers buyer and seller notifications.
//! * [`CatalogCache`] is invalidated (never populated) after each committed transition.
mod cache;
mod data_objects;
mod discrepancy_management;
mod fulfillment_store;
mod notifier;
mod order_store;
mod shipment_provider;

pub use cache::{cache_keys_for_order, CatalogCache, NoopCache};
pub use data_objects::{
    FailedTransition,
    Page,
    Pagination,
    PaidTransition,
    ShipmentSlot,
    StatusChange,
    DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use discrepancy_management::{DiscrepancyFilter, DiscrepancyManagement};
pub use fulfillment_store::FulfillmentStore;
pub use notifier::{Notification, NotificationKind, Notifier, Recipient};
pub use order_store::{OrderStore, StoreError};
pub use shipment_provider::{DownstreamError, ProviderDocument, ProviderShipment, ShipmentProvider, ShipmentRequest};

/// Everything the payment state machine needs from storage.
pub trait OrderFlowStore: OrderStore + DiscrepancyManagement {}

impl<T> OrderFlowStore for T where T: OrderStore + DiscrepancyManagement {}

/// Everything shipment tracking needs from storage.
pub trait ShipmentStore: FulfillmentStore + DiscrepancyManagement {}

impl<T> ShipmentStore for T where T: FulfillmentStore + DiscrepancyManagement {}
