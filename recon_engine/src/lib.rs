//! Order Reconciliation Engine
//!
//! The reconciliation engine is the order lifecycle core of the marketplace. It takes a checkout intent, consumes
//! payment gateway events, transitions order and payment state atomically, and coordinates the side effects that
//! follow a payment: analytics records, shipment creation and notifications. Anything that does not add up is
//! recorded as a discrepancy for a human to review.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`], [`SqliteDatabase`]). The engine only talks to storage through the traits. SQLite is
//!    the supported backend. The data types used in storage are defined in [`mod@db_types`] and are public.
//! 2. The public API ([`OrderFlowApi`], [`FulfillmentApi`], [`DiscrepancyApi`]). The state machine, the fulfillment
//!    coordinator and the discrepancy recorder.
//! 3. Events ([`mod@events`]). Committed transitions are published on a channel, and the fulfillment coordinator
//!    subscribes to them. Hooks run after commit, never inside the transaction.
//! 4. Signature verification for inbound callbacks ([`helpers::signature`]).
pub mod db_types;
pub mod events;
pub mod helpers;
mod recon_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use recon_api::{
    discrepancy_api::DiscrepancyApi,
    errors::ReconciliationError,
    fulfillment_api::FulfillmentApi,
    fulfillment_objects,
    order_flow_api::OrderFlowApi,
    order_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
