//! A thin client for the shipment provider's REST API: consignment creation, shipping labels and pickup manifests.
mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::ShippingApi;
pub use config::ShippingConfig;
pub use data_objects::{
    CreateShipmentRequest,
    CreateShipmentResponse,
    DocumentResponse,
    PackageDimensions,
    ShipmentDocument,
    ShipmentLineItem,
};
pub use error::ShippingApiError;
