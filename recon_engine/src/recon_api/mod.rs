//! # Reconciliation engine public API
//!
//! The `recon_api` module exposes the programmatic API of the reconciliation engine. The API is modular, so that
//! clients can pick and choose the functionality they need.
//!
//! * [`order_flow_api`] is the payment reconciliation state machine. It applies gateway events and manual status
//!   overrides to orders.
//! * [`fulfillment_api`] runs the post-payment side effects and the shipment operations.
//! * [`discrepancy_api`] records and queries anomalies for manual review.
//!
//! # API usage
//!
//! Every API is created by supplying the backends it needs. A single [`crate::SqliteDatabase`] implements all the
//! storage traits:
//!
//! ```rust,ignore
//! use recon_engine::{events::EventProducers, traits::NoopCache, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/recon.db", 5).await?;
//! let api = OrderFlowApi::new(db, NoopCache, EventProducers::default(), secret);
//! let outcome = api.apply(event).await?;
//! ```
pub mod discrepancy_api;
pub mod errors;
pub mod fulfillment_api;
pub mod fulfillment_objects;
pub mod order_flow_api;
pub mod order_objects;
