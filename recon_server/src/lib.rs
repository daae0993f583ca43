//! # Reconciliation server
//! This crate hosts the HTTP front end of the order reconciliation engine. It is responsible for:
//! * Receiving payment gateway webhooks and buyer confirmations, verifying their signatures, and feeding them to the
//!   payment state machine.
//! * Receiving tracking callbacks from the shipment provider.
//! * Serving the dashboard API: order details, manual status overrides, shipment retries, labels, manifests and the
//!   discrepancy queue.
//! * Re-dispatching fulfillment for paid orders whose side effects never ran (the outbox worker).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/checkout/intents`: Records the cart snapshot when checkout begins.
//! * `/gateway/webhook`, `/gateway/confirm`: Payment gateway callbacks.
//! * `/shipping/webhook`: Shipment provider tracking callbacks.
//! * `/api/...`: Dashboard routes. The caller's identity is supplied by the upstream auth proxy.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod outbox_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
