//! Adapters between this server and the outside world.
//!
//! * [`gateway`] converts payment gateway webhooks into [`recon_engine::order_objects::PaymentEvent`]s.
//! * [`shipping`] implements the engine's shipment provider contract on top of the provider's REST client, and
//!   converts tracking callbacks.
//! * [`notifications`] and [`cache`] deliver notifications and cache invalidations over HTTP.
//! * [`fulfillment`] subscribes the fulfillment coordinator to the engine's events.
pub mod cache;
pub mod fulfillment;
pub mod gateway;
pub mod notifications;
pub mod shipping;
